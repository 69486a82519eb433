use crate::models::contact::{ ContactForm, ContactRequest, Subject };
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Name,
    Email,
    Subject,
    Message,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: Field,
    pub reason: &'static str,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Contact form has {} invalid field(s)", .0.len())]
pub struct ContactError(pub Vec<FieldError>);

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() &&
        !domain.contains('@') &&
        !email.contains(char::is_whitespace) &&
        domain
            .rsplit_once('.')
            .map(|(host, tld)| !host.is_empty() && !tld.is_empty())
            .unwrap_or(false)
}

/// Checks every field and reports all failures at once.
pub fn validate(form: &ContactForm) -> Result<ContactRequest, ContactError> {
    let mut errors = Vec::new();

    let name = form.name.trim();
    if name.is_empty() {
        errors.push(FieldError { field: Field::Name, reason: "required" });
    }

    let email = form.email.trim();
    if email.is_empty() {
        errors.push(FieldError { field: Field::Email, reason: "required" });
    } else if !looks_like_email(email) {
        errors.push(FieldError { field: Field::Email, reason: "invalid email address" });
    }

    let subject = match form.subject.trim() {
        "" => {
            errors.push(FieldError { field: Field::Subject, reason: "required" });
            None
        }
        value =>
            match Subject::from_value(value) {
                Some(s) => Some(s),
                None => {
                    errors.push(FieldError { field: Field::Subject, reason: "unknown subject" });
                    None
                }
            }
    };

    let message = form.message.trim();
    if message.is_empty() {
        errors.push(FieldError { field: Field::Message, reason: "required" });
    }

    match subject {
        Some(subject) if errors.is_empty() =>
            Ok(ContactRequest {
                name: name.to_string(),
                email: email.to_string(),
                phone: Some(form.phone.trim().to_string()).filter(|p| !p.is_empty()),
                subject,
                message: message.to_string(),
            }),
        _ => Err(ContactError(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> ContactForm {
        ContactForm {
            name: "Asha Rao".into(),
            email: "asha@example.com".into(),
            phone: "".into(),
            subject: "order".into(),
            message: "Where is my parcel?".into(),
        }
    }

    #[test]
    fn valid_form_is_accepted() {
        let request = validate(&form()).unwrap();
        assert_eq!(request.subject, Subject::Order);
        assert_eq!(request.phone, None);
        assert_eq!(request.subject.title(), "Order Support");
    }

    #[test]
    fn every_failing_field_is_reported() {
        let err = validate(&ContactForm::default()).unwrap_err();
        let fields: Vec<Field> = err.0
            .iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(fields, vec![Field::Name, Field::Email, Field::Subject, Field::Message]);
        assert_eq!(err.to_string(), "Contact form has 4 invalid field(s)");
    }

    #[test]
    fn malformed_email_and_subject_are_rejected() {
        let mut f = form();
        f.email = "asha@localhost".into();
        f.subject = "billing".into();
        let err = validate(&f).unwrap_err();
        assert_eq!(err.0, vec![
            FieldError { field: Field::Email, reason: "invalid email address" },
            FieldError { field: Field::Subject, reason: "unknown subject" }
        ]);
    }

    #[test]
    fn email_shapes() {
        assert!(looks_like_email("a@b.in"));
        assert!(!looks_like_email("@b.in"));
        assert!(!looks_like_email("a@b@c.in"));
        assert!(!looks_like_email("a b@c.in"));
        assert!(!looks_like_email("a@.in"));
    }
}
