use bytes::Bytes;

/// A binary upload carried alongside the text fields of an application.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl Attachment {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// Public application form. Submission is anonymous; HR-only fields
/// (status, notes, rating) cannot be set here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub cover_letter: Option<String>,
    pub resume_url: Option<String>,
    pub linkedin_profile: Option<String>,
    pub resume_file: Option<Attachment>,
}

impl ApplicationForm {
    /// Text parts in the order they are sent. Optional fields are omitted when unset.
    pub fn text_fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = vec![
            ("first_name", self.first_name.as_str()),
            ("last_name", self.last_name.as_str()),
            ("email", self.email.as_str()),
        ];
        let optional = [
            ("cover_letter", &self.cover_letter),
            ("resume_url", &self.resume_url),
            ("linkedin_profile", &self.linkedin_profile),
        ];
        fields.extend(
            optional
                .into_iter()
                .filter_map(|(name, value)| value.as_deref().map(|v| (name, v))),
        );
        fields
    }
}
