use olm_core::errors::{ErrorInfo, OlmError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("element", "QH01")
        .with_context("position", "1.25")
}

#[test]
fn singular_matrix_surface() {
    let err = OlmError::SingularMatrix(sample_info("SM001", "zero determinant"));
    assert_eq!(err.info().code, "SM001");
    assert!(err.info().context.contains_key("element"));
}

#[test]
fn model_error_surface_with_added_context() {
    let err = OlmError::model("M001", "sub-length exceeds element").with_context("step", "3");
    assert_eq!(err.info().code, "M001");
    assert_eq!(err.info().context.get("step").map(String::as_str), Some("3"));
    assert!(matches!(err, OlmError::Model(_)));
}

#[test]
fn into_model_keeps_code_and_records_family() {
    let err = OlmError::SingularMatrix(sample_info("SM002", "response not invertible")).into_model();
    assert!(matches!(err, OlmError::Model(_)));
    assert_eq!(err.info().code, "SM002");
    assert_eq!(
        err.info().context.get("cause_family").map(String::as_str),
        Some("SingularMatrix")
    );
    assert_eq!(err.info().context.get("cause_code").map(String::as_str), Some("SM002"));
    let model = OlmError::model("M002", "already a model error").into_model();
    assert!(!model.info().context.contains_key("cause_family"));
}

#[test]
fn synchronization_error_display_lists_context() {
    let err = OlmError::Synchronization(
        sample_info("S001", "missing live value").with_hint("switch to design mode"),
    );
    let text = err.to_string();
    assert!(text.starts_with("synchronization error: missing live value"));
    assert!(text.contains("element=QH01"));
    assert!(text.contains("hint: switch to design mode"));
}

#[test]
fn errors_round_trip_through_json() {
    let err = OlmError::EmptyTrajectory(sample_info("E001", "no states"));
    let json = serde_json::to_string(&err).unwrap();
    assert!(json.contains("\"family\":\"EmptyTrajectory\""));
    let back: OlmError = serde_json::from_str(&json).unwrap();
    assert_eq!(back, err);
}
