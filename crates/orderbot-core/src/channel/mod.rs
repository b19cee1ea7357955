pub mod twilio;

/// Check if a sender is allowed based on the allow list.
pub fn is_allowed(sender_id: &str, allow_from: &[String]) -> bool {
    if allow_from.is_empty() {
        return true;
    }
    if allow_from.iter().any(|a| a == sender_id) {
        return true;
    }
    // "whatsapp:+1555" also matches a bare "+1555" entry
    match sender_id.split_once(':') {
        Some((_, number)) => allow_from.iter().any(|a| a == number),
        None => false,
    }
}
