//! 工具参数 JSON Schema 生成（schemars 自动生成工具 Schema）
//!
//! 工具把参数声明为带 `JsonSchema` 的结构体，这里负责生成提供给模型的 schema 与解析调用参数。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::ToolError;

/// 由参数结构体生成 function calling 所需的 parameters schema（去掉 $schema / title 等元信息）
pub fn parameters_for<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    let mut value = serde_json::to_value(&schema)
        .unwrap_or_else(|_| serde_json::json!({ "type": "object", "properties": {} }));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    value
}

/// 将模型给出的参数解析为结构体；缺少参数时按空对象处理
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    Ok(serde_json::from_value(args)?)
}
