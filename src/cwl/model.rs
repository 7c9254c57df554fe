//! CommandLineTool Data Model
//!
//! Typed representation of a CWL `CommandLineTool` and the value types it
//! shares with workflows: type references, expressions, bindings and
//! parameters.
//!
//! # Example YAML Format
//!
//! ```yaml
//! class: CommandLineTool
//! id: echo-tool
//! cwlVersion: v1.2
//! requirements:
//!   DockerRequirement:
//!     dockerPull: busybox
//! baseCommand: echo
//! inputs:
//!   message:
//!     type: string
//!     inputBinding:
//!       position: 0
//! outputs: []
//! ```

use std::fmt;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use super::requirements::Requirements;
use crate::error::DecodeError;

/// Discriminant of a [`CwlType`], also used to describe job values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Null,
    Bool,
    Int,
    Long,
    Float,
    Double,
    File,
    Directory,
    String,
    Record,
    Enum,
    Array,
    RecordField,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "boolean",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::File => "File",
            Self::Directory => "Directory",
            Self::String => "string",
            Self::Record => "record",
            Self::Enum => "enum",
            Self::Array => "array",
            Self::RecordField => "record field",
        };
        f.write_str(name)
    }
}

/// A single CWL type reference.
#[derive(Debug, Clone, PartialEq)]
pub enum CwlType {
    Null,
    Bool,
    Int,
    Long,
    Float,
    Double,
    File,
    Directory,
    String,
    Record(RecordSchema),
    Enum(EnumSchema),
    Array(ArraySchema),
    RecordField(RecordField),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub name: Option<String>,
    pub fields: Vec<RecordField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    pub name: String,
    pub types: Vec<CwlType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumSchema {
    pub name: Option<String>,
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArraySchema {
    pub items: Vec<CwlType>,
}

impl CwlType {
    pub fn kind(&self) -> TypeKind {
        match self {
            Self::Null => TypeKind::Null,
            Self::Bool => TypeKind::Bool,
            Self::Int => TypeKind::Int,
            Self::Long => TypeKind::Long,
            Self::Float => TypeKind::Float,
            Self::Double => TypeKind::Double,
            Self::File => TypeKind::File,
            Self::Directory => TypeKind::Directory,
            Self::String => TypeKind::String,
            Self::Record(_) => TypeKind::Record,
            Self::Enum(_) => TypeKind::Enum,
            Self::Array(_) => TypeKind::Array,
            Self::RecordField(_) => TypeKind::RecordField,
        }
    }

    /// Maps a bare type keyword to its type reference.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let ty = match keyword {
            "string" => Self::String,
            "null" => Self::Null,
            "boolean" => Self::Bool,
            "int" => Self::Int,
            "long" => Self::Long,
            "float" => Self::Float,
            "double" => Self::Double,
            "File" => Self::File,
            "Directory" => Self::Directory,
            _ => return None,
        };
        Some(ty)
    }
}

/// Parses a scalar type declaration, including the `T?` and `T[]` shorthands.
pub fn parse_type_keyword(declaration: &str) -> Result<Vec<CwlType>, DecodeError> {
    let (body, optional) = match declaration.strip_suffix('?') {
        Some(body) => (body, true),
        None => (declaration, false),
    };

    let ty = match body.strip_suffix("[]") {
        Some(items) => {
            let item = CwlType::from_keyword(items)
                .ok_or_else(|| DecodeError::UnknownType(declaration.to_string()))?;
            CwlType::Array(ArraySchema { items: vec![item] })
        }
        None => CwlType::from_keyword(body)
            .ok_or_else(|| DecodeError::UnknownType(declaration.to_string()))?,
    };

    if optional {
        Ok(vec![CwlType::Null, ty])
    } else {
        Ok(vec![ty])
    }
}

/// True when every declared type is `File`.
pub fn all_files(types: &[CwlType]) -> bool {
    types.iter().all(|ty| ty.kind() == TypeKind::File)
}

/// True when every declared type is `Directory`.
pub fn all_directories(types: &[CwlType]) -> bool {
    types.iter().all(|ty| ty.kind() == TypeKind::Directory)
}

/// First declared kind that is not `null`.
pub fn primary_kind(types: &[CwlType]) -> TypeKind {
    types
        .iter()
        .map(CwlType::kind)
        .find(|kind| *kind != TypeKind::Null)
        .unwrap_or(TypeKind::Null)
}

/// Deserializes a `type` field into a non-empty type sequence.
pub(crate) fn cwl_types<'de, D>(deserializer: D) -> Result<Vec<CwlType>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    match val {
        Value::String(s) => parse_type_keyword(&s).map_err(de::Error::custom),
        Value::Mapping(_) => Err(de::Error::custom(DecodeError::UnsupportedType {
            field: "type".to_string(),
            what: "complex",
        })),
        Value::Sequence(_) => Err(de::Error::custom(DecodeError::UnsupportedType {
            field: "type".to_string(),
            what: "array",
        })),
        _ => Err(de::Error::custom("type not supported")),
    }
}

/// Deserializes either a single scalar or array of scalars into Vec<String>
pub(crate) fn single_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    lift_strings(val).map_err(de::Error::custom)
}

pub(crate) fn optional_single_or_vec<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    single_or_vec(deserializer).map(Some)
}

/// Lifts a scalar to a one-element sequence; sequences must hold scalars.
pub(crate) fn lift_strings(val: Value) -> Result<Vec<String>, &'static str> {
    match val {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items
            .into_iter()
            .map(|item| scalar_to_string(&item).ok_or("Expected string in array"))
            .collect(),
        other => scalar_to_string(&other)
            .map(|s| vec![s])
            .ok_or("string | []string expected"),
    }
}

/// Renders a scalar YAML node as text.
pub(crate) fn scalar_to_string(val: &Value) -> Option<String> {
    match val {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A CWL value that may be a literal or a parametrized expression.
#[derive(Debug, Clone, PartialEq)]
pub enum CwlExpression {
    Raw(String),
    Expression(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

/// True when `s` is `$[...]` or `${...}` shaped.
pub fn is_expression(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() < 3 || bytes[0] != b'$' {
        return false;
    }
    matches!(
        (bytes[1], bytes[bytes.len() - 1]),
        (b'[', b']') | (b'{', b'}')
    )
}

impl CwlExpression {
    /// Classifies a string as an expression or a raw literal.
    pub fn parse(s: &str) -> Self {
        if is_expression(s) {
            Self::Expression(s.to_string())
        } else {
            Self::Raw(s.to_string())
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Raw(_) => "string",
            Self::Expression(_) => "expression",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
        }
    }

    pub(crate) fn from_value(val: Value) -> Result<Self, &'static str> {
        match val {
            Value::Bool(b) => Ok(Self::Bool(b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else {
                    n.as_f64()
                        .map(Self::Float)
                        .ok_or("can only be string | bool | int | float")
                }
            }
            Value::String(s) => Ok(Self::parse(&s)),
            _ => Err("can only be string | bool | int | float"),
        }
    }
}

impl<'de> Deserialize<'de> for CwlExpression {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let val = Value::deserialize(deserializer)?;
        Self::from_value(val).map_err(de::Error::custom)
    }
}

/// A `secondaryFiles` entry: a bare pattern or `{pattern, required}`.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryFileSchema {
    pub pattern: CwlExpression,
    pub required: Option<CwlExpression>,
}

impl SecondaryFileSchema {
    fn from_value(val: Value) -> Result<Self, String> {
        match val {
            Value::String(s) => Ok(Self {
                pattern: CwlExpression::parse(&s),
                required: None,
            }),
            Value::Mapping(mut map) => {
                let pattern = map
                    .remove("pattern")
                    .ok_or_else(|| "secondaryFiles entry requires 'pattern'".to_string())?;
                let pattern = CwlExpression::from_value(pattern).map_err(str::to_string)?;
                let required = map
                    .remove("required")
                    .map(CwlExpression::from_value)
                    .transpose()
                    .map_err(str::to_string)?;
                Ok(Self { pattern, required })
            }
            _ => Err("secondaryFiles entry must be a string or mapping".to_string()),
        }
    }
}

pub(crate) fn secondary_files<'de, D>(deserializer: D) -> Result<Option<Vec<SecondaryFileSchema>>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    let entries = match val {
        Value::Sequence(items) => items,
        other => vec![other],
    };
    entries
        .into_iter()
        .map(SecondaryFileSchema::from_value)
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
        .map_err(de::Error::custom)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadListing {
    NoListing,
    ShallowListing,
    DeepListing,
}

/// How an input parameter is placed on the command line.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandLineBinding {
    pub load_contents: Option<bool>,
    pub position: Option<i64>,
    pub prefix: Option<String>,
    pub separate: Option<bool>,
    pub item_separator: Option<String>,
    pub value_from: Option<CwlExpression>,
    pub shell_quote: Option<bool>,
}

impl CommandLineBinding {
    /// `separate` defaults to true.
    pub fn is_separate(&self) -> bool {
        self.separate.unwrap_or(true)
    }
}

/// The `glob` of an output binding.
#[derive(Debug, Clone, PartialEq)]
pub enum Glob {
    Single(String),
    List(Vec<String>),
    Expression(String),
}

impl<'de> Deserialize<'de> for Glob {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) if is_expression(&s) => Ok(Self::Expression(s)),
            Value::String(s) => Ok(Self::Single(s)),
            Value::Sequence(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(Self::List)
                .ok_or_else(|| de::Error::custom("glob list must contain only strings")),
            _ => Err(de::Error::custom(
                "glob must be a string, a list of strings or an expression",
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandLineOutputBinding {
    pub load_contents: Option<bool>,
    pub load_listing: Option<LoadListing>,
    pub glob: Option<Glob>,
    pub output_eval: Option<CwlExpression>,
}

/// An input of a `CommandLineTool`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandLineInputParameter {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(rename = "type", deserialize_with = "cwl_types")]
    pub types: Vec<CwlType>,

    pub label: Option<String>,

    #[serde(default, deserialize_with = "secondary_files")]
    pub secondary_files: Option<Vec<SecondaryFileSchema>>,

    pub streamable: Option<bool>,

    #[serde(default, deserialize_with = "single_or_vec")]
    pub doc: Vec<String>,

    #[serde(default, deserialize_with = "optional_single_or_vec")]
    pub format: Option<Vec<String>>,

    pub load_contents: Option<bool>,

    pub load_listing: Option<LoadListing>,

    /// Untyped default; only string defaults are lowered
    pub default: Option<Value>,

    pub input_binding: Option<CommandLineBinding>,
}

/// An output of a `CommandLineTool`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandLineOutputParameter {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(rename = "type", deserialize_with = "cwl_types")]
    pub types: Vec<CwlType>,

    pub label: Option<String>,

    #[serde(default, deserialize_with = "secondary_files")]
    pub secondary_files: Option<Vec<SecondaryFileSchema>>,

    pub streamable: Option<bool>,

    #[serde(default, deserialize_with = "single_or_vec")]
    pub doc: Vec<String>,

    #[serde(default, deserialize_with = "optional_single_or_vec")]
    pub format: Option<Vec<String>>,

    pub output_binding: Option<CommandLineOutputBinding>,
}

/// Parameters that carry an id which may be injected from a mapping key.
pub trait Identified {
    fn id(&self) -> Option<&str>;
    fn set_id(&mut self, id: String);
}

impl Identified for CommandLineInputParameter {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

impl Identified for CommandLineOutputParameter {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

impl CommandLineInputParameter {
    /// Id populated by the decoder; empty only for hand-built values.
    pub fn name(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

impl CommandLineOutputParameter {
    pub fn name(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

/// Untyped hints, kept only so their presence can be reported.
#[derive(Debug, Clone, PartialEq)]
pub enum Hints {
    List(Vec<Value>),
    Map(Mapping),
}

impl Hints {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::List(items) => items.is_empty(),
            Self::Map(map) => map.is_empty(),
        }
    }
}

/// A single containerized command invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandLineTool {
    pub class: Option<String>,
    pub id: Option<String>,
    pub label: Option<String>,
    pub doc: Vec<String>,
    pub requirements: Requirements,
    pub hints: Option<Hints>,
    pub cwl_version: Option<String>,
    pub intent: Vec<String>,
    pub base_command: Vec<String>,
    pub arguments: Vec<String>,
    pub inputs: Vec<CommandLineInputParameter>,
    pub outputs: Vec<CommandLineOutputParameter>,
    pub stdin: Option<CwlExpression>,
    pub stdout: Option<CwlExpression>,
    pub stderr: Option<CwlExpression>,
}

impl CommandLineTool {
    /// Tool id, or a placeholder for error messages.
    pub fn display_id(&self) -> &str {
        self.id.as_deref().unwrap_or("<anonymous CommandLineTool>")
    }

    pub fn output(&self, id: &str) -> Option<&CommandLineOutputParameter> {
        self.outputs.iter().find(|o| o.id.as_deref() == Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_detection() {
        assert!(is_expression("$[inputs.x]"));
        assert!(is_expression("${return 1;}"));
        assert!(!is_expression("$[]x"));
        assert!(!is_expression("$x"));
        assert!(!is_expression("$("));
        assert!(!is_expression("plain"));
        assert!(!is_expression("$(inputs.x)"));
    }

    #[test]
    fn test_expression_from_yaml_scalars() {
        let expr: CwlExpression = serde_yaml::from_str("4").unwrap();
        assert_eq!(expr, CwlExpression::Int(4));

        let expr: CwlExpression = serde_yaml::from_str("2.5").unwrap();
        assert_eq!(expr, CwlExpression::Float(2.5));

        let expr: CwlExpression = serde_yaml::from_str("true").unwrap();
        assert_eq!(expr, CwlExpression::Bool(true));

        let expr: CwlExpression = serde_yaml::from_str("'1024Mi'").unwrap();
        assert_eq!(expr, CwlExpression::Raw("1024Mi".to_string()));

        let expr: CwlExpression = serde_yaml::from_str("'${ return 2; }'").unwrap();
        assert!(matches!(expr, CwlExpression::Expression(_)));

        assert!(serde_yaml::from_str::<CwlExpression>("[1, 2]").is_err());
    }

    #[test]
    fn test_parse_type_keyword() {
        assert_eq!(parse_type_keyword("string").unwrap(), vec![CwlType::String]);
        assert_eq!(
            parse_type_keyword("File?").unwrap(),
            vec![CwlType::Null, CwlType::File]
        );
        assert_eq!(
            parse_type_keyword("int[]").unwrap(),
            vec![CwlType::Array(ArraySchema {
                items: vec![CwlType::Int]
            })]
        );
        assert!(matches!(
            parse_type_keyword("strng"),
            Err(DecodeError::UnknownType(_))
        ));
    }

    #[test]
    fn test_compound_types_not_supported() {
        let err = serde_yaml::from_str::<CommandLineInputParameter>(
            "type: {type: array, items: string}",
        )
        .unwrap_err();
        assert!(err.to_string().contains("not supported yet"));

        let err = serde_yaml::from_str::<CommandLineInputParameter>("type: [\"null\", string]")
            .unwrap_err();
        assert!(err.to_string().contains("not supported yet"));
    }

    #[test]
    fn test_all_files_and_directories() {
        assert!(all_files(&[CwlType::File]));
        assert!(!all_files(&[CwlType::Null, CwlType::File]));
        assert!(all_directories(&[CwlType::Directory]));
        assert!(!all_directories(&[CwlType::File]));
    }

    #[test]
    fn test_primary_kind_skips_null() {
        assert_eq!(primary_kind(&[CwlType::Null, CwlType::Int]), TypeKind::Int);
        assert_eq!(primary_kind(&[CwlType::Null]), TypeKind::Null);
    }

    #[test]
    fn test_doc_scalar_or_list_normalization() {
        let a: CommandLineInputParameter =
            serde_yaml::from_str("type: string\ndoc: hello").unwrap();
        let b: CommandLineInputParameter =
            serde_yaml::from_str("type: string\ndoc: [hello]").unwrap();
        assert_eq!(a.doc, vec!["hello".to_string()]);
        assert_eq!(a.doc, b.doc);

        assert!(serde_yaml::from_str::<CommandLineInputParameter>("type: string\ndoc: {a: b}")
            .is_err());
    }

    #[test]
    fn test_input_parameter_fields() {
        let param: CommandLineInputParameter = serde_yaml::from_str(
            r#"
type: File
format: edam:format_1930
secondaryFiles:
  - .bai
  - pattern: .crai
    required: false
inputBinding:
  position: 2
  prefix: -i
  separate: false
"#,
        )
        .unwrap();

        assert_eq!(param.format, Some(vec!["edam:format_1930".to_string()]));
        let secondary = param.secondary_files.unwrap();
        assert_eq!(secondary.len(), 2);
        assert_eq!(secondary[1].required, Some(CwlExpression::Bool(false)));

        let binding = param.input_binding.unwrap();
        assert_eq!(binding.position, Some(2));
        assert_eq!(binding.prefix.as_deref(), Some("-i"));
        assert!(!binding.is_separate());
    }

    #[test]
    fn test_glob_variants() {
        let glob: Glob = serde_yaml::from_str("out.txt").unwrap();
        assert_eq!(glob, Glob::Single("out.txt".to_string()));

        let glob: Glob = serde_yaml::from_str("[a.txt, b.txt]").unwrap();
        assert_eq!(glob, Glob::List(vec!["a.txt".into(), "b.txt".into()]));

        let glob: Glob = serde_yaml::from_str("'${ return \"x\"; }'").unwrap();
        assert!(matches!(glob, Glob::Expression(_)));

        assert!(serde_yaml::from_str::<Glob>("{a: b}").is_err());
    }

    #[test]
    fn test_load_listing_values() {
        let listing: LoadListing = serde_yaml::from_str("deep_listing").unwrap();
        assert_eq!(listing, LoadListing::DeepListing);
        assert!(serde_yaml::from_str::<LoadListing>("sideways_listing").is_err());
    }

    #[test]
    fn test_hints_is_empty() {
        assert!(Hints::List(Vec::new()).is_empty());
        assert!(!Hints::List(vec![Value::Null]).is_empty());
        assert!(Hints::Map(Mapping::new()).is_empty());
    }
}
