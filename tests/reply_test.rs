//! Integration tests for `Reply`'s public behavior. The multi-line folding
//! state machine itself is crate-internal and covered by unit tests next to
//! its implementation; these exercise what an external caller actually sees.

use ftp_rs::{Reply, ReplyClass};

fn reply(code: u16, message: &str) -> Reply {
    Reply {
        code,
        message: message.to_string(),
        info: Vec::new(),
    }
}

#[test]
fn test_classification_by_leading_digit() {
    assert_eq!(reply(125, "").class(), ReplyClass::PositivePreliminary);
    assert_eq!(reply(226, "").class(), ReplyClass::PositiveCompletion);
    assert_eq!(reply(350, "").class(), ReplyClass::PositiveIntermediate);
    assert_eq!(reply(425, "").class(), ReplyClass::TransientNegative);
    assert_eq!(reply(550, "").class(), ReplyClass::PermanentNegative);
    assert_eq!(reply(631, "").class(), ReplyClass::Protected);
}

#[test]
fn test_is_success_covers_1yz_through_3yz() {
    assert!(reply(150, "").is_success());
    assert!(reply(226, "").is_success());
    assert!(reply(350, "").is_success());
    assert!(!reply(450, "").is_success());
    assert!(!reply(550, "").is_success());
}

#[test]
fn test_is_preliminary_only_for_1yz() {
    assert!(reply(150, "").is_preliminary());
    assert!(!reply(226, "").is_preliminary());
}

#[test]
fn test_into_command_error_carries_code_and_joined_text() {
    let r = Reply {
        code: 550,
        message: "Permission denied".to_string(),
        info: vec!["File busy".to_string()],
    };
    let err = r.into_command_error();
    let text = err.to_string();
    assert!(text.contains("550"));
    assert!(text.contains("Permission denied"));
    assert!(text.contains("File busy"));
}

#[test]
fn test_full_text_joins_info_before_message() {
    let r = Reply {
        code: 211,
        message: "End".to_string(),
        info: vec!["Features:".to_string(), " EPSV".to_string()],
    };
    assert_eq!(r.full_text(), "Features:\n EPSV\nEnd");
}
