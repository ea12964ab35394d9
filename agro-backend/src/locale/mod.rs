//! Language handling and localized message catalogs
//!
//! This module contains:
//! - The closed set of supported language codes
//! - Canned rejection messages for non-agricultural queries
//! - Localized error messages (full translations for en/hi/pa)
//! - Best-effort script detection for error-path localization

use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use strum::{AsRefStr, EnumIter, EnumString};

/// Supported response languages, keyed by ISO 639-1 code.
///
/// Unknown codes decode to `En` so a model that invents a language code can
/// never fail deserialization of an otherwise valid analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, EnumString, AsRefStr, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Hi,
    Ta,
    Te,
    Mr,
    Bn,
    Gu,
    Kn,
    Ml,
    Pa,
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let code = String::deserialize(deserializer)?;
        Ok(Language::from_code(&code).unwrap_or(Language::En))
    }
}

impl Language {
    /// Parse a language code, tolerating whitespace and case.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::from_str(code.trim().to_lowercase().as_str()).ok()
    }

    /// Display name used when instructing the model which language to answer in.
    pub fn name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Hi => "Hindi (हिंदी)",
            Language::Ta => "Tamil (தமிழ்)",
            Language::Te => "Telugu (తెలుగు)",
            Language::Mr => "Marathi (मराठी)",
            Language::Bn => "Bengali (বাংলা)",
            Language::Gu => "Gujarati (ગુજરાતી)",
            Language::Kn => "Kannada (ಕನ್ನಡ)",
            Language::Ml => "Malayalam (മലയാളം)",
            Language::Pa => "Punjabi (ਪੰਜਾਬੀ)",
        }
    }
}

/// Canned reply for messages classified as non-agricultural.
pub fn rejection_message(language: Language) -> &'static str {
    match language {
        Language::En => {
            "I apologize, but I can only assist with farming and agricultural topics. Please ask me questions about crops, livestock, farming techniques, agricultural markets, or related farming matters."
        }
        Language::Hi => {
            "मुझे खेद है, लेकिन मैं केवल खेती और कृषि विषयों में सहायता कर सकता हूं। कृपया मुझसे फसलों, पशुधन, खेती की तकनीकों, कृषि बाजारों या संबंधित खेती के मामलों के बारे में प्रश्न पूछें।"
        }
        Language::Ta => {
            "மன்னிக்கவும், நான் விவசாயம் மற்றும் வேளாண்மை தொடர்பான விஷயங்களில் மட்டுமே உதவ முடியும்."
        }
        Language::Te => {
            "క్షమించండి, నేను వ్యవసాయం మరియు వ్యవసాయ అంశాలలో మాత్రమే సహాయం చేయగలను."
        }
        Language::Mr => "माफ करा, मी फक्त शेती आणि कृषी विषयांमध्ये मदत करू शकतो.",
        Language::Bn => "দুঃখিত, আমি শুধুমাত্র কৃষি এবং কৃষি বিষয়ে সাহায্য করতে পারি।",
        Language::Gu => "માફ કરશો, હું ફક્ત ખેતી અને કૃષિ વિષયોમાં મદદ કરી શકું છું.",
        Language::Kn => "ಕ್ಷಮಿಸಿ, ನಾನು ಕೇವಲ ಕೃಷಿ ಮತ್ತು ಕೃಷಿ ವಿಷಯಗಳಲ್ಲಿ ಮಾತ್ರ ಸಹಾಯ ಮಾಡಬಲ್ಲೆ.",
        Language::Ml => "ക്ഷമിക്കണം, എനിക്ക് കൃഷിയും കാർഷിക വിഷയങ്ങളിലും മാത്രമേ സഹായിക്കാൻ കഴിയൂ.",
        Language::Pa => "ਮਾਫ਼ ਕਰਨਾ, ਮੈਂ ਸਿਰਫ਼ ਖੇਤੀਬਾੜੀ ਅਤੇ ਖੇਤੀ ਵਿਸ਼ਿਆਂ ਵਿੱਚ ਮਦਦ ਕਰ ਸਕਦਾ ਹਾਂ।",
    }
}

/// Error message categories surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    ProcessingError,
    TimeoutError,
    ServiceUnavailable,
    InvalidInput,
}

/// Localized error message with English fallback for languages without
/// a full translation set.
pub fn error_message(kind: ErrorKind, language: Language) -> &'static str {
    match (language, kind) {
        (Language::Hi, ErrorKind::ProcessingError) => {
            "क्षमा करें, आपके अनुरोध को संसाधित करते समय एक त्रुटि हुई। कृपया पुनः प्रयास करें।"
        }
        (Language::Hi, ErrorKind::TimeoutError) => {
            "अनुरोध का समय समाप्त हो गया। कृपया छोटे संदेश के साथ प्रयास करें।"
        }
        (Language::Hi, ErrorKind::ServiceUnavailable) => {
            "सेवा अस्थायी रूप से अनुपलब्ध। कृपया बाद में पुनः प्रयास करें।"
        }
        (Language::Hi, ErrorKind::InvalidInput) => {
            "अमान्य इनपुट प्रदान किया गया। कृपया अपना संदेश जांचें और पुनः प्रयास करें।"
        }
        (Language::Pa, ErrorKind::ProcessingError) => {
            "ਮਾਫ਼ ਕਰਨਾ, ਤੁਹਾਡੀ ਬੇਨਤੀ ਨੂੰ ਪ੍ਰੋਸੈਸ ਕਰਦੇ ਸਮੇਂ ਇੱਕ ਗਲਤੀ ਹੋਈ। ਕਿਰਪਾ ਕਰਕੇ ਦੁਬਾਰਾ ਕੋਸ਼ਿਸ਼ ਕਰੋ।"
        }
        (Language::Pa, ErrorKind::TimeoutError) => {
            "ਬੇਨਤੀ ਦਾ ਸਮਾਂ ਸਮਾਪਤ ਹੋ ਗਿਆ। ਕਿਰਪਾ ਕਰਕੇ ਛੋਟੇ ਸੰਦੇਸ਼ ਨਾਲ ਕੋਸ਼ਿਸ਼ ਕਰੋ।"
        }
        (Language::Pa, ErrorKind::ServiceUnavailable) => {
            "ਸੇਵਾ ਅਸਥਾਈ ਤੌਰ 'ਤੇ ਅਨੁਪਲਬਧ। ਕਿਰਪਾ ਕਰਕੇ ਬਾਅਦ ਵਿੱਚ ਦੁਬਾਰਾ ਕੋਸ਼ਿਸ਼ ਕਰੋ।"
        }
        (Language::Pa, ErrorKind::InvalidInput) => {
            "ਅਵੈਧ ਇਨਪੁੱਟ ਪ੍ਰਦਾਨ ਕੀਤਾ ਗਿਆ। ਕਿਰਪਾ ਕਰਕੇ ਆਪਣਾ ਸੰਦੇਸ਼ ਚੈੱਕ ਕਰੋ ਅਤੇ ਦੁਬਾਰਾ ਕੋਸ਼ਿਸ਼ ਕਰੋ।"
        }
        (_, ErrorKind::ProcessingError) => {
            "Sorry, I encountered an error while processing your request. Please try again."
        }
        (_, ErrorKind::TimeoutError) => "Request timed out. Please try with a shorter message.",
        (_, ErrorKind::ServiceUnavailable) => {
            "Service temporarily unavailable. Please try again later."
        }
        (_, ErrorKind::InvalidInput) => {
            "Invalid input provided. Please check your message and try again."
        }
    }
}

/// Best-effort language sniffing by Unicode script block.
///
/// Only used to localize error responses when no analysis result is
/// available. Devanagari text maps to Hindi even though Marathi shares the
/// script; that is an accepted limitation of the heuristic.
pub fn detect_script_language(text: &str) -> Language {
    for ch in text.chars() {
        match ch {
            '\u{0900}'..='\u{097F}' => return Language::Hi,
            '\u{0A00}'..='\u{0A7F}' => return Language::Pa,
            _ => {}
        }
    }
    Language::En
}
