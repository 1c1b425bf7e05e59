//! Configuration validation for pluggable implementation sections.
//!
//! Price sources and storage backends receive their configuration as raw
//! `toml::Value` tables. Each implementation describes the shape it accepts
//! with a [`Schema`] and the builder validates the table before calling the
//! factory, so misconfigured sources fail at startup rather than at the first
//! swap request.

use crate::Address;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	/// A required field is missing.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// A field is present but its value is not acceptable.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// A field has the wrong TOML type.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
	/// The table could not be deserialized into the implementation's config struct.
	#[error("Failed to deserialize config: {0}")]
	DeserializationError(String),
}

/// The type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// An integer with optional inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
	Boolean,
	/// A decimal number written either as a TOML float/integer or as a string,
	/// with optional inclusive bounds.
	Decimal {
		min: Option<Decimal>,
		max: Option<Decimal>,
	},
	/// A 20-byte hex address string.
	Address,
	/// An array whose elements all share one type.
	Array(Box<FieldType>),
	/// A nested table with its own schema.
	Table(Schema),
}

/// Custom validator run after the type check succeeds.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named field in a [`Schema`].
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Attaches a custom validator that runs after the type check.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}
}

/// Required and optional fields accepted by one configuration table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML table against this schema.
	///
	/// Required fields must be present; optional fields are checked only when
	/// present. Nested tables are validated recursively and field names in the
	/// resulting error are reported with their dotted path.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table".to_string(),
				actual: config.type_str().to_string(),
			})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			check_field(field, value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				check_field(field, value)?;
			}
		}

		Ok(())
	}
}

fn check_field(field: &Field, value: &toml::Value) -> Result<(), ValidationError> {
	validate_field_type(&field.name, value, &field.field_type)?;
	if let Some(validator) = &field.validator {
		validator(value).map_err(|message| ValidationError::InvalidValue {
			field: field.name.clone(),
			message,
		})?;
	}
	Ok(())
}

fn mismatch(field_name: &str, expected: &str, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field_name.to_string(),
		expected: expected.to_string(),
		actual: value.type_str().to_string(),
	}
}

/// Reads a TOML value as a decimal, accepting floats, integers and strings.
pub fn toml_decimal(value: &toml::Value) -> Option<Decimal> {
	match value {
		toml::Value::String(s) => Decimal::from_str(s.trim()).ok(),
		toml::Value::Integer(i) => Some(Decimal::from(*i)),
		toml::Value::Float(f) => Decimal::from_str(&f.to_string()).ok(),
		_ => None,
	}
}

fn validate_field_type(
	field_name: &str,
	value: &toml::Value,
	expected_type: &FieldType,
) -> Result<(), ValidationError> {
	match expected_type {
		FieldType::String => {
			if !value.is_str() {
				return Err(mismatch(field_name, "string", value));
			}
		},
		FieldType::Boolean => {
			if !value.is_bool() {
				return Err(mismatch(field_name, "boolean", value));
			}
		},
		FieldType::Integer { min, max } => {
			let int_val = value
				.as_integer()
				.ok_or_else(|| mismatch(field_name, "integer", value))?;
			if let Some(min_val) = min.filter(|m| int_val < *m) {
				return Err(ValidationError::InvalidValue {
					field: field_name.to_string(),
					message: format!("Value {} is less than minimum {}", int_val, min_val),
				});
			}
			if let Some(max_val) = max.filter(|m| int_val > *m) {
				return Err(ValidationError::InvalidValue {
					field: field_name.to_string(),
					message: format!("Value {} is greater than maximum {}", int_val, max_val),
				});
			}
		},
		FieldType::Decimal { min, max } => {
			let dec = toml_decimal(value).ok_or_else(|| mismatch(field_name, "decimal", value))?;
			if let Some(min_val) = min.filter(|m| dec < *m) {
				return Err(ValidationError::InvalidValue {
					field: field_name.to_string(),
					message: format!("Value {} is less than minimum {}", dec, min_val),
				});
			}
			if let Some(max_val) = max.filter(|m| dec > *m) {
				return Err(ValidationError::InvalidValue {
					field: field_name.to_string(),
					message: format!("Value {} is greater than maximum {}", dec, max_val),
				});
			}
		},
		FieldType::Address => {
			let s = value
				.as_str()
				.ok_or_else(|| mismatch(field_name, "address string", value))?;
			Address::from_str(s).map_err(|e| ValidationError::InvalidValue {
				field: field_name.to_string(),
				message: format!("Invalid address '{}': {}", s, e),
			})?;
		},
		FieldType::Array(inner_type) => {
			let array = value
				.as_array()
				.ok_or_else(|| mismatch(field_name, "array", value))?;
			for (i, item) in array.iter().enumerate() {
				validate_field_type(&format!("{}[{}]", field_name, i), item, inner_type)?;
			}
		},
		FieldType::Table(schema) => {
			schema.validate(value).map_err(|e| match e {
				ValidationError::MissingField(f) => {
					ValidationError::MissingField(format!("{}.{}", field_name, f))
				},
				ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
					field: format!("{}.{}", field_name, field),
					message,
				},
				ValidationError::TypeMismatch {
					field,
					expected,
					actual,
				} => ValidationError::TypeMismatch {
					field: format!("{}.{}", field_name, field),
					expected,
					actual,
				},
				other => other,
			})?;
		},
	}

	Ok(())
}

/// A configuration schema that can validate a raw TOML table.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	fn parse(s: &str) -> toml::Value {
		toml::from_str(s).unwrap()
	}

	#[test]
	fn test_required_and_optional_fields() {
		let schema = Schema::new(
			vec![Field::new("symbol", FieldType::String)],
			vec![Field::new(
				"timeout_seconds",
				FieldType::Integer {
					min: Some(1),
					max: Some(60),
				},
			)],
		);

		assert!(schema.validate(&parse("symbol = \"ARBUSDC\"")).is_ok());
		assert!(matches!(
			schema.validate(&parse("timeout_seconds = 5")),
			Err(ValidationError::MissingField(f)) if f == "symbol"
		));
		assert!(matches!(
			schema.validate(&parse("symbol = \"x\"\ntimeout_seconds = 0")),
			Err(ValidationError::InvalidValue { .. })
		));
	}

	#[test]
	fn test_decimal_field_accepts_strings_and_floats() {
		let schema = Schema::new(
			vec![Field::new(
				"price",
				FieldType::Decimal {
					min: Some(Decimal::ZERO),
					max: None,
				},
			)],
			vec![],
		);

		assert!(schema.validate(&parse("price = \"0.52\"")).is_ok());
		assert!(schema.validate(&parse("price = 0.52")).is_ok());
		assert!(schema.validate(&parse("price = 3")).is_ok());
		assert!(schema.validate(&parse("price = \"-1\"")).is_err());
		assert!(schema.validate(&parse("price = \"abc\"")).is_err());
		assert_eq!(toml_decimal(&toml::Value::String("1.25".into())), Some(dec!(1.25)));
	}

	#[test]
	fn test_nested_table_reports_dotted_path() {
		let schema = Schema::new(
			vec![Field::new(
				"feed",
				FieldType::Table(Schema::new(
					vec![Field::new("address", FieldType::Address)],
					vec![],
				)),
			)],
			vec![],
		);

		let err = schema
			.validate(&parse("[feed]\naddress = \"not-an-address\""))
			.unwrap_err();
		assert!(err.to_string().contains("feed.address"));

		let ok = parse("[feed]\naddress = \"0xb2A824043730FE05F3DA2efaFa1CBbe83fa548D6\"");
		assert!(schema.validate(&ok).is_ok());
	}
}
