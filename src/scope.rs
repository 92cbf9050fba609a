//! Where in the type hierarchy a declaration lives.
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Structural role of the analyzed data: request-shaped, response-shaped, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    In,
    Out,
    InOut,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            "in-out" | "inout" => Ok(Self::InOut),
            other => Err(format!("unknown role `{other}` (expected in, out or in-out)")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::In => "in",
            Self::Out => "out",
            Self::InOut => "in-out",
        })
    }
}

/// Naming context for declarations. Immutable; derive new ones with [`Identifier::nested`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Identifier {
    name: String,
    role: Role,
    call: Option<String>,
}

impl Identifier {
    /// The scope a file is entered with: no name, no enclosing operation.
    pub fn root(role: Role) -> Self {
        Self { name: String::new(), role, call: None }
    }

    /// The scope of one side (request or response) of an operation.
    pub fn for_call(role: Role, call: impl Into<String>) -> Self {
        Self { name: String::new(), role, call: Some(call.into()) }
    }

    /// Same role and operation, one path segment deeper.
    pub fn nested(&self, name: &str) -> Self {
        let name = if self.name.is_empty() {
            name.to_owned()
        } else {
            format!("{}/{name}", self.name)
        };
        Self { name, role: self.role, call: self.call.clone() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn call(&self) -> Option<&str> {
        self.call.as_deref()
    }

    /// `name/path` for schemas; `call/(role)/name/path` inside an operation,
    /// so that request and response sides of one call stay apart.
    pub fn qualified_name(&self) -> String {
        match &self.call {
            Some(call) if self.name.is_empty() => format!("{call}/({})", self.role),
            Some(call) => format!("{call}/({})/{}", self.role, self.name),
            None => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn nesting_extends_the_path_and_keeps_role_and_call() {
        let root = Identifier::root(Role::Out);
        assert_eq!(root.qualified_name(), "");

        let pet = root.nested("Pet");
        let tags = pet.nested("tags");
        assert_eq!(tags.name(), "Pet/tags");
        assert_eq!(tags.role(), Role::Out);
        assert_eq!(tags.call(), None);
        assert_eq!(tags.qualified_name(), "Pet/tags");
    }

    #[test]
    fn operation_scopes_are_qualified_by_the_operation() {
        let call = Identifier::for_call(Role::In, "getPet");
        assert_eq!(call.qualified_name(), "getPet/(in)");
        assert_eq!(call.nested("petId").qualified_name(), "getPet/(in)/petId");
        assert_eq!(call.nested("petId").call(), Some("getPet"));
    }

    #[test]
    fn request_and_response_sides_qualify_differently() {
        let request = Identifier::for_call(Role::In, "getPet").nested("id");
        let response = Identifier::for_call(Role::Out, "getPet").nested("id");
        assert_ne!(request.qualified_name(), response.qualified_name());
        assert_eq!(response.qualified_name(), "getPet/(out)/id");
    }

    #[rstest]
    #[case("in", Role::In)]
    #[case("out", Role::Out)]
    #[case("in-out", Role::InOut)]
    #[case("inout", Role::InOut)]
    fn roles_parse(#[case] input: &str, #[case] expected: Role) {
        assert_eq!(input.parse::<Role>(), Ok(expected));
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!("sideways".parse::<Role>().is_err());
    }
}
