use serde_json::Value;

use crate::models::FormType;

/// Field names that must be present for a work order.
pub const WORK_ORDER_FIELDS: &[&str] = &[
    "domicilio",
    "localidad",
    "solicitante",
    "tecnicos",
    "telefono",
    "tareasRealizadas",
    "horasEmpleadas",
    "trabajoRealizado",
    "receptorNombre",
    "receptorDni",
    "firma",
];

pub const RECEIPT_FIELDS: &[&str] = &["clientName", "receptorNombre", "receptorDni", "firma"];

/// Returns the names of required fields missing from `payload`. Empty means valid.
pub trait Validator: Send + Sync {
    fn validate(&self, form_type: FormType, payload: &Value) -> Vec<String>;
}

/// Presence check against a fixed list of required fields per form type.
pub struct RequiredFieldsValidator {
    work_order: Vec<String>,
    receipt: Vec<String>,
}

impl Default for RequiredFieldsValidator {
    fn default() -> Self {
        Self::new(WORK_ORDER_FIELDS, RECEIPT_FIELDS)
    }
}

impl RequiredFieldsValidator {
    pub fn new(work_order: &[&str], receipt: &[&str]) -> Self {
        Self {
            work_order: work_order.iter().map(|s| s.to_string()).collect(),
            receipt: receipt.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn required(&self, form_type: FormType) -> &[String] {
        match form_type {
            FormType::WorkOrder => &self.work_order,
            FormType::Receipt => &self.receipt,
        }
    }
}

impl Validator for RequiredFieldsValidator {
    fn validate(&self, form_type: FormType, payload: &Value) -> Vec<String> {
        let Some(obj) = payload.as_object() else {
            return vec!["payload".to_string()];
        };

        self.required(form_type)
            .iter()
            .filter(|name| match obj.get(name.as_str()) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .cloned()
            .collect()
    }
}
