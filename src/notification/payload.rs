//! 入站通知帧解析
//!
//! 服务端推送的每一帧都是带 `type` 字段的 JSON 对象，其余字段随类型变化。
//! 解析后的 `Notification` 不可变，通过 `Arc` 在分类器、展示器和订阅者之间共享。

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::category::EventCategory;
use crate::error::FrameError;

/// 入站通知（保留原始 payload）
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    fields: Map<String, Value>,
    kind: String,
}

impl Serialize for Notification {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl Notification {
    /// 从文本帧解析
    pub fn from_frame(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// 从 JSON 值构建
    pub fn from_value(value: Value) -> Result<Self, FrameError> {
        let Value::Object(fields) = value else {
            return Err(FrameError::NotAnObject);
        };
        let kind = fields
            .get("type")
            .and_then(Value::as_str)
            .ok_or(FrameError::MissingType)?
            .to_string();
        Ok(Self { fields, kind })
    }

    /// `type` 字段原文
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// 订阅分类
    pub fn category(&self) -> EventCategory {
        EventCategory::from_type(&self.kind)
    }

    /// 原始 payload（包含 `type`）
    pub fn payload(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// 读取字符串字段，原样返回；空白字符串视为缺失
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// 读取整数字段，兼容数字字符串和浮点数
    pub fn int_field(&self, key: &str) -> Option<i64> {
        match self.fields.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}
