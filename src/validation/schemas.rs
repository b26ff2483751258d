use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde_json::json;

/// Compiled JSON schemas for upstream callback payloads
pub struct SchemaRegistry {
    pub stk_callback_v1: JSONSchema,
}

impl SchemaRegistry {
    fn new() -> Self {
        Self {
            stk_callback_v1: JSONSchema::compile(&stk_callback_schema_v1())
                .expect("Failed to compile stk callback schema"),
        }
    }
}

/// Global schema registry with cached compiled schemas
pub static SCHEMAS: Lazy<SchemaRegistry> = Lazy::new(SchemaRegistry::new);

/// JSON schema for the Daraja STK callback envelope (v1)
fn stk_callback_schema_v1() -> serde_json::Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "required": ["Body"],
        "properties": {
            "Body": {
                "type": "object",
                "required": ["stkCallback"],
                "properties": {
                    "stkCallback": {
                        "type": "object",
                        "required": [
                            "MerchantRequestID",
                            "CheckoutRequestID",
                            "ResultCode",
                            "ResultDesc"
                        ],
                        "properties": {
                            "MerchantRequestID": {
                                "type": "string",
                                "maxLength": 255
                            },
                            "CheckoutRequestID": {
                                "type": "string",
                                "maxLength": 255
                            },
                            "ResultCode": {
                                "type": "integer"
                            },
                            "ResultDesc": {
                                "type": "string",
                                "maxLength": 1024
                            },
                            "CallbackMetadata": {
                                "type": "object",
                                "properties": {
                                    "Item": {
                                        "type": "array",
                                        "items": {
                                            "type": "object",
                                            "required": ["Name"],
                                            "properties": {
                                                "Name": { "type": "string" },
                                                "Value": {}
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_schema_valid_success_payload() {
        let valid = json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultCode": 0,
                    "ResultDesc": "The service request is processed successfully.",
                    "CallbackMetadata": {
                        "Item": [
                            {"Name": "Amount", "Value": 500.0},
                            {"Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV"},
                            {"Name": "PhoneNumber", "Value": 254712345678u64}
                        ]
                    }
                }
            }
        });

        assert!(SCHEMAS.stk_callback_v1.validate(&valid).is_ok());
    }

    #[test]
    fn test_callback_schema_valid_failure_payload() {
        // Failure callbacks carry no CallbackMetadata.
        let valid = json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultCode": 1032,
                    "ResultDesc": "Request cancelled by user"
                }
            }
        });

        assert!(SCHEMAS.stk_callback_v1.validate(&valid).is_ok());
    }

    #[test]
    fn test_callback_schema_missing_result_code() {
        let invalid = json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultDesc": "missing code"
                }
            }
        });

        assert!(SCHEMAS.stk_callback_v1.validate(&invalid).is_err());
    }

    #[test]
    fn test_callback_schema_non_integer_result_code() {
        let invalid = json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "a",
                    "CheckoutRequestID": "b",
                    "ResultCode": "0",
                    "ResultDesc": "stringly typed"
                }
            }
        });

        assert!(SCHEMAS.stk_callback_v1.validate(&invalid).is_err());
    }

    #[test]
    fn test_callback_schema_missing_body() {
        assert!(SCHEMAS.stk_callback_v1.validate(&json!({})).is_err());
    }
}
