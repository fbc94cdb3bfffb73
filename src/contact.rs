//! WhatsApp contact links.

use crate::types::Vehicle;

/// Digits of a phone number, everything else dropped.
pub fn phone_digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// `https://wa.me/<digits>` with an optional pre-filled message, or `#` when
/// the phone carries no digits at all.
pub fn whatsapp_link(phone: &str, text: Option<&str>) -> String {
    let digits = phone_digits(phone);
    if digits.is_empty() {
        return "#".to_string();
    }
    match text.filter(|t| !t.is_empty()) {
        Some(text) => format!("https://wa.me/{}?text={}", digits, urlencoding::encode(text)),
        None => format!("https://wa.me/{}", digits),
    }
}

/// Link to the vehicle's seller, pre-filled with the seller's preset (or a
/// generic greeting) and the listing title.
pub fn vehicle_contact_link(vehicle: &Vehicle) -> String {
    let greeting = vehicle.seller.wa_preset.as_deref().unwrap_or("Hola! Me interesa el vehículo");
    let text = format!("{} {}", greeting.trim_end(), vehicle.title);
    whatsapp_link(&vehicle.seller.phone_e164, Some(text.trim()))
}
