//! Identity fields of the stored session snapshot.
//!
//! Both types hold validated text. The backend emits user ids as JSON numbers while
//! older deployments send strings; either form is accepted and persisted as text.

// std
use std::str::FromStr;
// self
use crate::_prelude::*;

const LABEL_MAX_LEN: usize = 128;

/// Error returned when an identity field fails validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The value was empty.
	#[error("{field} cannot be empty.")]
	Empty {
		/// Offending field.
		field: &'static str,
	},
	/// The value contained whitespace.
	#[error("{field} must not contain whitespace.")]
	ContainsWhitespace {
		/// Offending field.
		field: &'static str,
	},
	/// The value was longer than the permitted byte length.
	#[error("{field} is longer than {max} bytes.")]
	TooLong {
		/// Offending field.
		field: &'static str,
		/// Maximum permitted byte length.
		max: usize,
	},
}

/// Backend identifier of the signed-in user.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "WireId", into = "String")]
pub struct UserId(String);
impl UserId {
	/// Validates and wraps `value`.
	pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
		let value = value.into();

		check_label("User id", &value)?;

		Ok(Self(value))
	}
}
impl AsRef<str> for UserId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<UserId> for String {
	fn from(value: UserId) -> Self {
		value.0
	}
}
impl TryFrom<WireId> for UserId {
	type Error = IdentifierError;

	fn try_from(value: WireId) -> Result<Self, Self::Error> {
		match value {
			WireId::Number(n) => Ok(Self(n.to_string())),
			WireId::Text(text) => Self::new(text),
		}
	}
}
impl Debug for UserId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "UserId({})", self.0)
	}
}
impl Display for UserId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Role granted to the signed-in user (`admin`, `Super Admin`, ...), stored verbatim.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Role(String);
impl Role {
	/// Wraps `value`, rejecting only blank or oversized labels.
	pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
		let value = value.into();

		if value.trim().is_empty() {
			return Err(IdentifierError::Empty { field: "Role" });
		}
		if value.len() > LABEL_MAX_LEN {
			return Err(IdentifierError::TooLong { field: "Role", max: LABEL_MAX_LEN });
		}

		Ok(Self(value))
	}

	/// Whether this is the `admin` role, ignoring ASCII case.
	pub fn is_admin(&self) -> bool {
		self.0.eq_ignore_ascii_case("admin")
	}
}
impl AsRef<str> for Role {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<Role> for String {
	fn from(value: Role) -> Self {
		value.0
	}
}
impl TryFrom<String> for Role {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl FromStr for Role {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl Debug for Role {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Role({})", self.0)
	}
}
impl Display for Role {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
	Number(i64),
	Text(String),
}

fn check_label(field: &'static str, value: &str) -> Result<(), IdentifierError> {
	if value.is_empty() {
		Err(IdentifierError::Empty { field })
	} else if value.chars().any(char::is_whitespace) {
		Err(IdentifierError::ContainsWhitespace { field })
	} else if value.len() > LABEL_MAX_LEN {
		Err(IdentifierError::TooLong { field, max: LABEL_MAX_LEN })
	} else {
		Ok(())
	}
}
