//! 結構化輸出的 schema 描述與 fallback 預設值合成。
//!
//! 欄位型別在建構時就決定為封閉的 [`FieldKind`]，合成預設值是對它的全函數。

use crate::utils::error::{NlpError, Result};
use serde_json::{json, Map, Value};

/// 字串欄位的預設哨兵值
pub const STRING_SENTINEL: &str = "unavailable";

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Null,
    Enum(Vec<Value>),
    Union(Vec<FieldKind>),
}

impl FieldKind {
    fn from_type_name(name: &str) -> Result<Self> {
        match name {
            "string" => Ok(FieldKind::String),
            "integer" => Ok(FieldKind::Integer),
            "number" => Ok(FieldKind::Number),
            "boolean" => Ok(FieldKind::Boolean),
            "array" => Ok(FieldKind::Array),
            "object" => Ok(FieldKind::Object),
            "null" => Ok(FieldKind::Null),
            other => Err(NlpError::schema(format!("unknown field type '{}'", other))),
        }
    }

    /// 解析 JSON Schema 的單一屬性定義
    fn from_json_schema(node: &Value) -> Result<Self> {
        if let Some(variants) = node.get("enum").and_then(|v| v.as_array()) {
            return Ok(FieldKind::Enum(variants.clone()));
        }
        if let Some(constant) = node.get("const") {
            return Ok(FieldKind::Enum(vec![constant.clone()]));
        }
        for key in ["anyOf", "oneOf"] {
            if let Some(options) = node.get(key).and_then(|v| v.as_array()) {
                let kinds = options
                    .iter()
                    .map(FieldKind::from_json_schema)
                    .collect::<Result<Vec<_>>>()?;
                return Ok(FieldKind::Union(kinds));
            }
        }
        match node.get("type") {
            Some(Value::String(name)) => FieldKind::from_type_name(name),
            Some(Value::Array(names)) => {
                let kinds = names
                    .iter()
                    .map(|n| {
                        n.as_str()
                            .ok_or_else(|| NlpError::schema("type list must contain strings"))
                            .and_then(FieldKind::from_type_name)
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(FieldKind::Union(kinds))
            }
            // 沒有型別資訊時視為字串
            None => Ok(FieldKind::String),
            Some(other) => Err(NlpError::schema(format!("invalid type entry {}", other))),
        }
    }

    fn to_json_schema(&self) -> Value {
        match self {
            FieldKind::String => json!({"type": "string"}),
            FieldKind::Integer => json!({"type": "integer"}),
            FieldKind::Number => json!({"type": "number"}),
            FieldKind::Boolean => json!({"type": "boolean"}),
            FieldKind::Array => json!({"type": "array"}),
            FieldKind::Object => json!({"type": "object"}),
            FieldKind::Null => json!({"type": "null"}),
            FieldKind::Enum(values) => json!({"enum": values}),
            FieldKind::Union(kinds) => {
                json!({"anyOf": kinds.iter().map(FieldKind::to_json_schema).collect::<Vec<_>>()})
            }
        }
    }

    /// 依宣告型別產生預設值；Null 與空的 enum/union 無法產生
    pub fn default_value(&self) -> Option<Value> {
        match self {
            FieldKind::String => Some(Value::String(STRING_SENTINEL.to_string())),
            FieldKind::Integer => Some(json!(0)),
            FieldKind::Number => Some(json!(0.0)),
            FieldKind::Boolean => Some(Value::Bool(false)),
            FieldKind::Array => Some(Value::Array(Vec::new())),
            FieldKind::Object => Some(Value::Object(Map::new())),
            FieldKind::Null => None,
            FieldKind::Enum(values) => values.iter().find(|v| !v.is_null()).cloned(),
            FieldKind::Union(kinds) => kinds
                .iter()
                .filter(|k| **k != FieldKind::Null)
                .find_map(FieldKind::default_value),
        }
    }

    /// 檢查值是否符合宣告型別
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Number => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Array => value.is_array(),
            FieldKind::Object => value.is_object(),
            FieldKind::Null => value.is_null(),
            FieldKind::Enum(values) => values.contains(value),
            FieldKind::Union(kinds) => kinds.iter().any(|k| k.accepts(value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl FieldSpec {
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
            description: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// 優先順序：明確預設值 → union 第一個非 null 變體 → enum 第一個值 → 型別預設值
    pub fn fallback_value(&self) -> Option<Value> {
        if let Some(default) = &self.default {
            return Some(default.clone());
        }
        self.kind.default_value()
    }
}

/// 物件 schema：欄位順序即宣告順序
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }

    /// 從 JSON Schema 物件定義建立 schema
    pub fn from_json_schema(name: impl Into<String>, schema: &Value) -> Result<Self> {
        let name = name.into();
        let properties = match schema.get("properties") {
            Some(Value::Object(props)) => props,
            Some(_) => return Err(NlpError::schema("'properties' must be an object")),
            None => return Ok(Self::new(name)),
        };
        let required: Vec<&str> = schema
            .get("required")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        let mut fields = Vec::with_capacity(properties.len());
        for (field_name, node) in properties {
            fields.push(FieldSpec {
                name: field_name.clone(),
                kind: FieldKind::from_json_schema(node)?,
                required: required.contains(&field_name.as_str()),
                default: node.get("default").cloned(),
                description: node
                    .get("description")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            });
        }

        for req in &required {
            if !fields.iter().any(|f| f.name == *req) {
                return Err(NlpError::schema(format!(
                    "required field '{}' has no property definition",
                    req
                )));
            }
        }

        Ok(Self { name, fields })
    }

    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut node = field.kind.to_json_schema();
            if let Value::Object(obj) = &mut node {
                if let Some(default) = &field.default {
                    obj.insert("default".to_string(), default.clone());
                }
                if let Some(description) = &field.description {
                    obj.insert("description".to_string(), json!(description));
                }
            }
            properties.insert(field.name.clone(), node);
        }
        let required: Vec<&str> = self.required_fields().map(|f| f.name.as_str()).collect();
        json!({
            "title": self.name,
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// 產生 fallback 物件：每個欄位都有值，必填欄位無法合成時回傳錯誤
    pub fn synthesize_fallback(&self) -> Result<Map<String, Value>> {
        let mut object = Map::new();
        for field in &self.fields {
            match field.fallback_value() {
                Some(value) => {
                    object.insert(field.name.clone(), value);
                }
                None if field.required => {
                    return Err(NlpError::schema(format!(
                        "cannot synthesize a value for required field '{}' of schema '{}'",
                        field.name, self.name
                    )));
                }
                None => {
                    object.insert(field.name.clone(), Value::Null);
                }
            }
        }
        Ok(object)
    }

    /// 讓模型輸出符合 schema：缺少的選填欄位補上預設值，必填欄位缺失或型別不符則失敗
    pub fn conform(&self, value: Value) -> Result<Value> {
        let mut object = match value {
            Value::Object(obj) => obj,
            other => {
                return Err(NlpError::malformed(format!(
                    "expected a JSON object for '{}', got {}",
                    self.name,
                    type_name(&other)
                )))
            }
        };

        for field in &self.fields {
            match object.get(&field.name) {
                Some(v) if field.kind.accepts(v) => {}
                Some(Value::Null) if !field.required => {}
                Some(v) => {
                    return Err(NlpError::malformed(format!(
                        "field '{}' has unexpected {} value",
                        field.name,
                        type_name(v)
                    )))
                }
                None if field.required => {
                    return Err(NlpError::malformed(format!(
                        "missing required field '{}'",
                        field.name
                    )))
                }
                None => {
                    let filler = field.fallback_value().unwrap_or(Value::Null);
                    object.insert(field.name.clone(), filler);
                }
            }
        }

        Ok(Value::Object(object))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 可由 schema 描述並從 JSON 反序列化的結構化輸出型別
pub trait Schematic: serde::de::DeserializeOwned + Send + 'static {
    fn schema() -> Schema;
}
