use crate::config::Aggregation;
use crate::error::{ValidationError, ValidationKind, ValidatorError};
use crate::property::{render_message, FieldDescriptor, FieldType};
use crate::schema::CompiledSchema;
use crate::value::Value;
use std::collections::BTreeMap;

/// Fill every declared field that has a default and no value yet.
/// An explicit `null` is a value and is left alone.
pub fn apply_defaults(schema: &CompiledSchema, fields: &mut BTreeMap<String, Value>) {
    for (name, descriptor) in schema.fields() {
        let Some(default) = &descriptor.default else {
            continue;
        };
        let missing = fields.get(name).map_or(true, Value::is_undefined);
        if missing {
            let value = default.resolve();
            let value = descriptor.field_type.cast(value.clone()).unwrap_or(value);
            fields.insert(name.clone(), value);
        }
    }
}

/// Validate a document's fields against its schema.
///
/// Values that cast cleanly are written back in their cast form. Every
/// declared field is checked in order: cast, required, enum, then the
/// attached validators. The returned error is empty when the document is
/// valid.
pub fn validate_document(
    schema: &CompiledSchema,
    fields: &mut BTreeMap<String, Value>,
    aggregation: Aggregation,
) -> ValidationError {
    let mut result = ValidationError::new(schema.name());

    for (path, descriptor) in schema.fields() {
        let raw = fields.get(path).cloned().unwrap_or_default();

        let value = match descriptor.field_type.cast(raw) {
            Ok(value) => value,
            Err(bad) => {
                result.push(ValidatorError {
                    kind: ValidationKind::Cast,
                    path: path.clone(),
                    message: format!(
                        "Cast to {} failed for value \"{bad}\" at path \"{path}\"",
                        descriptor.field_type
                    ),
                    value: bad,
                });
                continue;
            }
        };
        if fields.contains_key(path) {
            fields.insert(path.clone(), value.clone());
        }

        for failure in check_field(path, descriptor, &value, aggregation) {
            result.push(failure);
        }
    }

    if !result.is_empty() {
        log::debug!("{result}");
    }
    result
}

fn check_field(
    path: &str,
    descriptor: &FieldDescriptor,
    value: &Value,
    aggregation: Aggregation,
) -> Vec<ValidatorError> {
    let failure = |kind, message: &str, offending: &Value| ValidatorError {
        kind,
        path: path.to_string(),
        message: render_message(message, path, offending),
        value: offending.clone(),
    };

    // A required string also treats "" as missing
    let blank = descriptor.field_type == FieldType::String && value.as_str() == Some("");
    if value.is_nullish() || (descriptor.required && blank) {
        if descriptor.required {
            let message = match &descriptor.name {
                Some(label) => format!("{label} is required"),
                None => format!("Path `{path}` is required."),
            };
            return vec![failure(ValidationKind::Required, &message, value)];
        }
        return Vec::new();
    }

    let mut failures = Vec::new();

    if let Some(enumeration) = &descriptor.enumeration {
        let item_type = match &descriptor.field_type {
            FieldType::Array(Some(item)) => item.as_ref(),
            other => other,
        };
        let allowed = |candidate: &Value| {
            enumeration
                .values
                .iter()
                .any(|v| item_type.cast(v.clone()).as_ref() == Ok(candidate))
        };
        let rejected = match value {
            Value::Sequence(items) => items
                .iter()
                .find(|item| !item.is_nullish() && !allowed(item)),
            scalar => (!allowed(scalar)).then_some(scalar),
        };
        if let Some(rejected) = rejected {
            failures.push(failure(ValidationKind::Enum, &enumeration.message, rejected));
            if aggregation == Aggregation::FirstFailure {
                return failures;
            }
        }
    }

    for validator in descriptor.failing_validators(value) {
        failures.push(failure(ValidationKind::Custom, &validator.message, value));
        if aggregation == Aggregation::FirstFailure {
            break;
        }
    }

    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::property::PropertyBuilder;
    use crate::schema::SchemaOptions;
    use pretty_assertions::assert_eq;

    fn account_schema(config: &Config) -> CompiledSchema {
        let mut email = PropertyBuilder::named("Email", config);
        email.string().required(true).valid_email(None);

        let mut role = PropertyBuilder::new(config);
        role.string()
            .enumeration(["admin", "member"], None)
            .default_value("member");

        let mut nickname = PropertyBuilder::named("Nickname", config);
        nickname.string().minimum(5, None).alphanumeric_only(None);

        let mut age = PropertyBuilder::new(config);
        age.number();

        CompiledSchema::compile(
            "Account",
            [
                ("email", email),
                ("role", role),
                ("nickname", nickname),
                ("age", age),
            ],
            SchemaOptions::new(),
        )
        .unwrap()
    }

    fn fields(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_valid_document() {
        let config = Config::default();
        let schema = account_schema(&config);
        let mut data = fields(&[
            ("email", Value::from("a@example.com")),
            ("nickname", Value::from("fourX")),
        ]);
        apply_defaults(&schema, &mut data);
        let result = validate_document(&schema, &mut data, Aggregation::FirstFailure);
        assert!(result.is_empty(), "{result}");
        assert_eq!(data["role"], Value::from("member"));
    }

    #[test]
    fn test_missing_required_field() {
        let config = Config::default();
        let schema = account_schema(&config);
        let mut data = BTreeMap::new();
        let result = validate_document(&schema, &mut data, Aggregation::FirstFailure);
        let err = result.error("email").unwrap();
        assert_eq!(err.kind, ValidationKind::Required);
        assert_eq!(err.message, "Email is required");
        assert_eq!(result.paths().collect::<Vec<_>>(), vec!["email"]);
    }

    #[test]
    fn test_unlabeled_required_message() {
        let config = Config::default();
        let mut code = PropertyBuilder::new(&config);
        code.string().required(true);
        let schema =
            CompiledSchema::compile("Thing", [("code", code)], SchemaOptions::new()).unwrap();
        let result = validate_document(&schema, &mut BTreeMap::new(), Aggregation::FirstFailure);
        assert_eq!(result.error("code").unwrap().message, "Path `code` is required.");
    }

    #[test]
    fn test_required_string_rejects_empty_text() {
        let config = Config::default();
        let schema = account_schema(&config);
        let mut data = fields(&[("email", Value::from(""))]);
        let result = validate_document(&schema, &mut data, Aggregation::AllFailures);
        let errors = &result.errors["email"];
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationKind::Required);
        assert_eq!(errors[0].message, "Email is required");

        // Optional strings keep "" and still run their validators
        let mut data = fields(&[
            ("email", Value::from("a@example.com")),
            ("nickname", Value::from("")),
        ]);
        let result = validate_document(&schema, &mut data, Aggregation::FirstFailure);
        assert_eq!(result.error("nickname").unwrap().kind, ValidationKind::Custom);
        assert!(result.error("email").is_none());
    }

    #[test]
    fn test_invalid_enum_value() {
        let config = Config::default();
        let schema = account_schema(&config);
        let mut data = fields(&[
            ("email", Value::from("a@example.com")),
            ("role", Value::from("owner")),
        ]);
        let result = validate_document(&schema, &mut data, Aggregation::FirstFailure);
        let err = result.error("role").unwrap();
        assert_eq!(err.kind, ValidationKind::Enum);
        assert_eq!(err.message, "`owner` is not supported");
        assert_eq!(err.value, Value::from("owner"));
    }

    #[test]
    fn test_cast_failure() {
        let config = Config::default();
        let schema = account_schema(&config);
        let mut data = fields(&[
            ("email", Value::from("a@example.com")),
            ("age", Value::from("old")),
        ]);
        let result = validate_document(&schema, &mut data, Aggregation::FirstFailure);
        let err = result.error("age").unwrap();
        assert_eq!(err.kind, ValidationKind::Cast);
        assert_eq!(
            err.message,
            "Cast to number failed for value \"old\" at path \"age\""
        );
    }

    #[test]
    fn test_cast_values_are_written_back() {
        let config = Config::default();
        let schema = account_schema(&config);
        let mut data = fields(&[
            ("email", Value::from("a@example.com")),
            ("age", Value::from("42")),
        ]);
        let result = validate_document(&schema, &mut data, Aggregation::FirstFailure);
        assert!(result.is_empty());
        assert_eq!(data["age"], Value::from(42));
        assert!(!data.contains_key("nickname"));
    }

    #[test]
    fn test_aggregation_modes() {
        let config = Config::default();
        let schema = account_schema(&config);
        let mut data = fields(&[
            ("email", Value::from("a@example.com")),
            ("nickname", Value::from("a-b")),
        ]);

        let first = validate_document(&schema, &mut data.clone(), Aggregation::FirstFailure);
        assert_eq!(first.errors["nickname"].len(), 1);
        assert_eq!(first.errors["nickname"][0].message, "Nickname must be at least 5");

        let all = validate_document(&schema, &mut data, Aggregation::AllFailures);
        let messages: Vec<&str> = all.errors["nickname"]
            .iter()
            .map(|e| e.message.as_str())
            .collect();
        assert_eq!(
            messages,
            vec![
                "Nickname must be at least 5",
                "Nickname should contain alpha-numeric characters only",
            ]
        );
    }

    #[test]
    fn test_array_enum_checks_each_element() {
        let config = Config::default();
        let mut tags = PropertyBuilder::new(&config);
        tags.array_of(FieldType::String)
            .enumeration(["red", "blue"], "{PATH} rejects {VALUE}");
        let schema =
            CompiledSchema::compile("Thing", [("tags", tags)], SchemaOptions::new()).unwrap();

        let mut ok = fields(&[("tags", Value::from(vec![Value::from("red"), Value::from("blue")]))]);
        assert!(validate_document(&schema, &mut ok, Aggregation::FirstFailure).is_empty());

        let mut bad = fields(&[("tags", Value::from(vec![Value::from("red"), Value::from("green")]))]);
        let result = validate_document(&schema, &mut bad, Aggregation::FirstFailure);
        assert_eq!(result.error("tags").unwrap().message, "tags rejects green");
    }

    #[test]
    fn test_explicit_null_keeps_default_away() {
        let config = Config::default();
        let schema = account_schema(&config);
        let mut data = fields(&[("role", Value::Null)]);
        apply_defaults(&schema, &mut data);
        assert_eq!(data["role"], Value::Null);
    }
}
