use serde::{Deserialize, Serialize};

/// Language of the text printed on a certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "hi")]
    Hindi,
}

impl Language {
    /// Parse a language code; anything other than `hi` selects English
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "hi" => Language::Hindi,
            _ => Language::English,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Hindi => "hi",
        }
    }

    /// Name of the language written in that language
    pub fn native_name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "हिंदी",
        }
    }

    /// Whether the built-in PDF fonts can draw this language's strings
    pub fn is_latin(&self) -> bool {
        matches!(self, Language::English)
    }

    pub fn strings(&self) -> &'static CertificateStrings {
        match self {
            Language::English => &ENGLISH,
            Language::Hindi => &HINDI,
        }
    }

    pub fn all() -> [Language; 2] {
        [Language::English, Language::Hindi]
    }
}

/// Every fixed piece of text drawn on a certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CertificateStrings {
    pub event_id_label: &'static str,
    pub certificate_id_label: &'static str,
    pub title: &'static str,
    pub subtitle: &'static str,
    pub participated: &'static str,
    pub held_on: &'static str,
    pub organized_by: &'static str,
    pub achievement: &'static str,
    pub left_signature: [&'static str; 3],
    pub right_signature: [&'static str; 3],
    pub authority: &'static str,
    pub digitally_signed: &'static str,
    pub scan_to_verify: &'static str,
    pub certificate_type: &'static str,
}

pub static ENGLISH: CertificateStrings = CertificateStrings {
    event_id_label: "Event ID:",
    certificate_id_label: "Certificate ID:",
    title: "CERTIFICATE OF PARTICIPATION",
    subtitle: "This is to certify that",
    participated: "has successfully participated in the",
    held_on: "held on",
    organized_by: "organized by",
    achievement: "This certificate is awarded in recognition of outstanding participation",
    left_signature: [
        "Authorized Signature",
        "EventEye Platform",
        "Chief Technology Officer",
    ],
    right_signature: ["Digital Verification", "EventEye Certification", "System"],
    authority: "EventEye Certification Authority",
    digitally_signed: "This certificate is digitally signed and verified",
    scan_to_verify: "Scan to Verify",
    certificate_type: "Certificate of Participation",
};

pub static HINDI: CertificateStrings = CertificateStrings {
    event_id_label: "इवेंट आईडी:",
    certificate_id_label: "प्रमाणपत्र आईडी:",
    title: "भागीदारी का प्रमाणपत्र",
    subtitle: "यह प्रमाणित किया जाता है कि",
    participated: "ने सफलतापूर्वक भाग लिया",
    held_on: "आयोजन तिथि:",
    organized_by: "आयोजक:",
    achievement: "यह प्रमाणपत्र उत्कृष्ट भागीदारी की मान्यता में प्रदान किया जाता है",
    left_signature: [
        "अधिकृत हस्ताक्षर",
        "EventEye प्लेटफ़ॉर्म",
        "मुख्य प्रौद्योगिकी अधिकारी",
    ],
    right_signature: ["डिजिटल सत्यापन", "EventEye प्रमाणन", "प्रणाली"],
    authority: "EventEye प्रमाणन प्राधिकरण",
    digitally_signed: "यह प्रमाणपत्र डिजिटल रूप से हस्ताक्षरित और सत्यापित है",
    scan_to_verify: "सत्यापन हेतु स्कैन करें",
    certificate_type: "भागीदारी का प्रमाणपत्र",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_codes_fall_back_to_english() {
        assert_eq!(Language::from_code("hi"), Language::Hindi);
        assert_eq!(Language::from_code(" HI "), Language::Hindi);
        for code in ["en", "", "fr", "hindi"] {
            assert_eq!(Language::from_code(code), Language::English);
        }
    }

    #[test]
    fn serializes_as_code() {
        assert_eq!(serde_json::to_string(&Language::Hindi).unwrap(), "\"hi\"");
    }
}
