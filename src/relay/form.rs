//! Form kinds and the typed views used to render notification emails.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormKind {
    Contact,
    Membership,
}

impl FormKind {
    /// Resolve the form kind from the last path segment of a request path.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let segment = path.trim_end_matches('/').rsplit('/').next()?;
        match segment {
            "send-contact-form" => Some(Self::Contact),
            "send-membership-form" => Some(Self::Membership),
            _ => None,
        }
    }

    /// Endpoint segment that routes to this kind.
    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Contact => "send-contact-form",
            Self::Membership => "send-membership-form",
        }
    }

    /// Prefix of the persisted submission file name.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Contact => "contact-form",
            Self::Membership => "membership-form",
        }
    }
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactForm {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(deserialize_with = "lenient_string")]
    pub phone: String,
    #[serde(deserialize_with = "lenient_string")]
    pub subject: String,
    #[serde(deserialize_with = "lenient_string")]
    pub message: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct MembershipForm {
    #[serde(deserialize_with = "lenient_string")]
    pub full_name: String,
    /// Five digit association registry number.
    #[serde(deserialize_with = "lenient_string")]
    pub registry_number: String,
    #[serde(deserialize_with = "lenient_string")]
    pub birth_date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub blood_type: String,
    #[serde(deserialize_with = "lenient_string")]
    pub birth_city: String,
    #[serde(deserialize_with = "lenient_string")]
    pub education: String,
    #[serde(deserialize_with = "lenient_string")]
    pub occupation: String,
    #[serde(deserialize_with = "lenient_string")]
    pub workplace: String,
    #[serde(deserialize_with = "lenient_string")]
    pub phone: String,
    #[serde(deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(deserialize_with = "lenient_string")]
    pub city: String,
    #[serde(deserialize_with = "lenient_string")]
    pub district: String,
    #[serde(deserialize_with = "lenient_string")]
    pub address: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub consent: bool,
}

impl ContactForm {
    /// # Errors
    /// Returns an error if the form data cannot be read as a contact form.
    pub fn from_form_data(form_data: &Map<String, Value>) -> serde_json::Result<Self> {
        serde_json::from_value(Value::Object(form_data.clone()))
    }

    #[must_use]
    pub fn subject_line(&self) -> String {
        format!("Yeni İletişim Mesajı - {}", self.subject)
    }

    #[must_use]
    pub fn to_html(&self) -> String {
        let message = escape_html(&self.message).replace('\n', "<br>");
        let rows = [
            row("Ad Soyad", &escape_html(&self.name)),
            row("E-posta", &escape_html(&self.email)),
            row("Telefon", &escape_html(&self.phone)),
            row("Konu", &escape_html(&self.subject)),
            row("Mesaj", &message),
        ];
        table("Yeni İletişim Mesajı", &rows)
    }
}

impl MembershipForm {
    /// # Errors
    /// Returns an error if the form data cannot be read as a membership form.
    pub fn from_form_data(form_data: &Map<String, Value>) -> serde_json::Result<Self> {
        serde_json::from_value(Value::Object(form_data.clone()))
    }

    #[must_use]
    pub fn subject_line(&self) -> String {
        format!("Yeni Üyelik Başvurusu - {}", self.full_name)
    }

    /// Field problems worth flagging to the operator. They never block the relay.
    #[must_use]
    pub fn warnings(&self) -> Vec<&'static str> {
        let mut warnings = Vec::new();
        if !valid_registry_number(&self.registry_number) {
            warnings.push("registry number is not five digits");
        }
        if !self.consent {
            warnings.push("consent was not given");
        }
        warnings
    }

    #[must_use]
    pub fn to_html(&self) -> String {
        let address = escape_html(&self.address).replace('\n', "<br>");
        let consent = if self.consent { "Evet" } else { "Hayır" };
        let rows = [
            row("Ad Soyad", &escape_html(&self.full_name)),
            row("Üye Sicil No", &escape_html(&self.registry_number)),
            row("Doğum Tarihi", &escape_html(&self.birth_date)),
            row("Kan Grubu", &escape_html(&self.blood_type)),
            row("Doğum Yeri", &escape_html(&self.birth_city)),
            row("Eğitim Durumu", &escape_html(&self.education)),
            row("Meslek", &escape_html(&self.occupation)),
            row("İş Yeri", &escape_html(&self.workplace)),
            row("Telefon", &escape_html(&self.phone)),
            row("E-posta", &escape_html(&self.email)),
            row("İl", &escape_html(&self.city)),
            row("İlçe", &escape_html(&self.district)),
            row("Adres", &address),
            row("Aydınlatma Metni Onayı", consent),
        ];
        table("Yeni Üyelik Başvurusu", &rows)
    }
}

#[must_use]
pub fn valid_registry_number(value: &str) -> bool {
    value.len() == 5 && value.bytes().all(|b| b.is_ascii_digit())
}

fn row(label: &str, value: &str) -> String {
    format!(
        "<tr><th style=\"text-align:left;padding:8px;border:1px solid #ddd;background:#f5f5f5;\">{label}</th>\
         <td style=\"padding:8px;border:1px solid #ddd;\">{value}</td></tr>"
    )
}

fn table(title: &str, rows: &[String]) -> String {
    let mut html = format!(
        "<h2>{title}</h2><table style=\"border-collapse:collapse;width:100%;max-width:640px;\">"
    );
    for row in rows {
        html.push_str(row);
    }
    html.push_str("</table>");
    html
}

#[must_use]
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

// Browsers post whatever the input produced; accept any scalar as text.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        Value::String(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "on" | "1" | "yes" | "evet"
        ),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_kind_from_path() {
        assert_eq!(
            FormKind::from_path("/send-contact-form"),
            Some(FormKind::Contact)
        );
        assert_eq!(
            FormKind::from_path("/api/send-membership-form/"),
            Some(FormKind::Membership)
        );
        assert_eq!(FormKind::from_path("/api/send-newsletter"), None);
        assert_eq!(FormKind::from_path(""), None);
    }

    #[test]
    fn test_kind_slugs() {
        assert_eq!(FormKind::Contact.slug(), "contact-form");
        assert_eq!(FormKind::Membership.slug(), "membership-form");
        assert_eq!(FormKind::Membership.endpoint(), "send-membership-form");
    }

    #[test]
    fn test_membership_subject_line() {
        let form = MembershipForm::from_form_data(&object(json!({
            "fullName": "Ayşe Yılmaz",
            "registryNumber": "01907",
            "consent": true,
        })));
        let form = form.unwrap_or_default();
        assert_eq!(form.subject_line(), "Yeni Üyelik Başvurusu - Ayşe Yılmaz");
        assert!(form.warnings().is_empty());
    }

    #[test]
    fn test_contact_subject_line() {
        let form = ContactForm::from_form_data(&object(json!({ "subject": "Bilet" })))
            .unwrap_or_default();
        assert_eq!(form.subject_line(), "Yeni İletişim Mesajı - Bilet");
    }

    #[test]
    fn test_lenient_fields() {
        let form = MembershipForm::from_form_data(&object(json!({
            "fullName": null,
            "registryNumber": 12345,
            "consent": "on",
            "unknownField": "ignored",
        })));
        assert!(form.is_ok());
        let form = form.unwrap_or_default();
        assert_eq!(form.full_name, "");
        assert_eq!(form.registry_number, "12345");
        assert!(form.consent);
    }

    #[test]
    fn test_membership_warnings() {
        let form = MembershipForm {
            registry_number: "1234".to_string(),
            ..MembershipForm::default()
        };
        assert_eq!(
            form.warnings(),
            vec!["registry number is not five digits", "consent was not given"]
        );
    }

    #[test]
    fn test_html_is_escaped() {
        let form = ContactForm {
            name: "<script>alert('x')</script>".to_string(),
            message: "satır 1\nsatır 2".to_string(),
            ..ContactForm::default()
        };
        let html = form.to_html();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
        assert!(html.contains("satır 1<br>satır 2"));
    }

    #[test]
    fn test_membership_html_labels() {
        let form = MembershipForm {
            full_name: "Mehmet Demir".to_string(),
            blood_type: "0 Rh+".to_string(),
            consent: true,
            ..MembershipForm::default()
        };
        let html = form.to_html();
        assert!(html.contains("Kan Grubu"));
        assert!(html.contains("0 Rh+"));
        assert!(html.contains("Evet"));
    }

    #[test]
    fn test_registry_number() {
        assert!(valid_registry_number("00001"));
        assert!(!valid_registry_number("0001"));
        assert!(!valid_registry_number("12a45"));
        assert!(!valid_registry_number("١٢٣٤٥"));
    }
}
