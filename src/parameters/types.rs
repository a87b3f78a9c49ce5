//! Parameter types

use serde::{Deserialize, Serialize};

/// The type of a declared parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParameterType {
    String,
    /// A string that is never echoed back into rendered forms
    Secret,
    #[serde(alias = "int")]
    Integer,
    Float,
    #[serde(alias = "boolean")]
    Bool,
    Date,
    Choice,
    StringList,
    #[serde(alias = "int-list")]
    IntegerList,
    FloatList,
    ChoiceList,
    /// `key:value` items collected into an object
    KeyValue,
    StringFromFile,
    StringListFromFile,
    ObjectFromFile,
    ObjectListFromFile,
}

impl ParameterType {
    /// Returns true for types that hold more than one value
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            ParameterType::StringList
                | ParameterType::IntegerList
                | ParameterType::FloatList
                | ParameterType::ChoiceList
                | ParameterType::KeyValue
                | ParameterType::StringListFromFile
                | ParameterType::ObjectListFromFile
        )
    }

    /// Returns true for types whose raw value is the content of a file.
    ///
    /// Over HTTP there is no file to open, so the request value itself is
    /// read as the file content.
    pub fn is_file_loading(&self) -> bool {
        matches!(
            self,
            ParameterType::StringFromFile
                | ParameterType::StringListFromFile
                | ParameterType::ObjectFromFile
                | ParameterType::ObjectListFromFile
        )
    }

    /// Type of a single item of a list type, or the type itself for scalars
    pub fn item_type(&self) -> ParameterType {
        match self {
            ParameterType::StringList | ParameterType::StringListFromFile => ParameterType::String,
            ParameterType::IntegerList => ParameterType::Integer,
            ParameterType::FloatList => ParameterType::Float,
            ParameterType::ChoiceList => ParameterType::Choice,
            other => *other,
        }
    }

    /// Returns string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Secret => "secret",
            ParameterType::Integer => "integer",
            ParameterType::Float => "float",
            ParameterType::Bool => "bool",
            ParameterType::Date => "date",
            ParameterType::Choice => "choice",
            ParameterType::StringList => "string-list",
            ParameterType::IntegerList => "integer-list",
            ParameterType::FloatList => "float-list",
            ParameterType::ChoiceList => "choice-list",
            ParameterType::KeyValue => "key-value",
            ParameterType::StringFromFile => "string-from-file",
            ParameterType::StringListFromFile => "string-list-from-file",
            ParameterType::ObjectFromFile => "object-from-file",
            ParameterType::ObjectListFromFile => "object-list-from-file",
        }
    }
}

impl std::fmt::Display for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_and_file_classification() {
        assert!(ParameterType::StringList.is_list());
        assert!(ParameterType::ObjectListFromFile.is_list());
        assert!(!ParameterType::Date.is_list());

        assert!(ParameterType::ObjectFromFile.is_file_loading());
        assert!(!ParameterType::KeyValue.is_file_loading());
    }

    #[test]
    fn test_serde_names() {
        let t: ParameterType = serde_yaml::from_str("string-list").unwrap();
        assert_eq!(t, ParameterType::StringList);

        let t: ParameterType = serde_yaml::from_str("int").unwrap();
        assert_eq!(t, ParameterType::Integer);

        assert_eq!(
            serde_json::to_string(&ParameterType::ObjectFromFile).unwrap(),
            "\"object-from-file\""
        );
    }
}
