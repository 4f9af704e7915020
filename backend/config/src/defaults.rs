//! Config defaults: applies default values to parsed config.

use std::collections::BTreeMap;

use docintake_core::DocumentKind;

use crate::schema::{
    ColumnSpec, ImageConfig, InferenceConfig, IntakeConfig, LoggingConfig, PromptsConfig,
    SessionConfig,
};

/// Default re-submissions allowed per document kind.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default idle time before a session is reaped.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30 * 60;

/// Default deadline for a single model call.
pub const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 300;

/// Default parallel model calls for reentrant backends.
pub const DEFAULT_MAX_CONCURRENT: usize = 2;

/// Default minimum width and height in pixels.
pub const DEFAULT_MIN_IMAGE_SIDE: u32 = 100;

/// Files under 1 KiB are treated as empty.
pub const DEFAULT_MIN_IMAGE_BYTES: usize = 1024;

/// Default upload ceiling.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_MONDAY_API_URL: &str = "https://api.monday.com/v2";

pub const DEFAULT_MONDAY_API_VERSION: &str = "2024-01";

pub const DEFAULT_IDENTITY_CARD_PROMPT: &str = "Below is an identity card image. <image>\n\
Extract and list the following information in exactly this format:\n\
Name: [Full name including Chinese name if present]\n\
Race: [Race]\n\
Date of birth: [DOB in DD-MM-YYYY format]\n\
Sex: [M or F]\n\
Country/Place of birth: [Country or place of birth]\n\n\
Only output the extracted information in the exact format above.";

pub const DEFAULT_DRIVERS_LICENSE_PROMPT: &str = "Below is a driver's license image. <image>\n\
Extract and list the following information in exactly this format:\n\
Name: [Full name including Chinese name if present]\n\
License Number: [License number]\n\
Date of birth: [DOB in DD-MM-YYYY format]\n\
Issue Date: [Issue date in DD-MM-YYYY format]\n\
Valid From: [Date in DD-MM-YYYY format]\n\
Valid To: [Date in DD-MM-YYYY format]\n\
Classes: [Licence classes]\n\n\
Only output the extracted information in the exact format above.";

pub const DEFAULT_LOG_CARD_PROMPT: &str = "Below is a vehicle log card image. <image>\n\
Extract and list every visible field in exactly this format, one per line:\n\
Vehicle No: [Registration number]\n\
Make/Model: [Make / Model]\n\
Vehicle Type: [Vehicle type]\n\
Vehicle Attachment 1: [Attachment]\n\
Vehicle Scheme: [Scheme]\n\
Chassis No: [Chassis number]\n\
Propellant: [Fuel]\n\
Engine No: [Engine number]\n\
Motor No: [Motor number]\n\
Engine Capacity: [cc]\n\
Power Rating: [Rating]\n\
Maximum Power Output: [kW (bhp)]\n\
Maximum Laden Weight: [kg]\n\
Unladen Weight: [kg]\n\
Year Of Manufacture: [Year]\n\
Original Registration Date: [DD Mon YYYY]\n\
Lifespan Expiry Date: [DD Mon YYYY]\n\
COE Category: [Category]\n\
PQP Paid: [Amount]\n\
COE Expiry Date: [DD Mon YYYY]\n\
Road Tax Expiry Date: [DD Mon YYYY]\n\
PARF Eligibility Expiry Date: [DD Mon YYYY]\n\
Inspection Due Date: [DD Mon YYYY]\n\
Intended Transfer Date: [DD Mon YYYY]\n\n\
Only output the extracted information in the exact format above.";

/// Built-in prompt for a kind, used when the config leaves it unset.
pub fn default_prompt(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::IdentityCard => DEFAULT_IDENTITY_CARD_PROMPT,
        DocumentKind::DriversLicense => DEFAULT_DRIVERS_LICENSE_PROMPT,
        DocumentKind::LogCard => DEFAULT_LOG_CARD_PROMPT,
    }
}

pub fn default_allowed_formats() -> Vec<String> {
    ["jpeg", "png", "webp"].iter().map(|s| s.to_string()).collect()
}

/// Board column ids used by the policy board.
pub fn default_workbook_columns() -> BTreeMap<String, ColumnSpec> {
    let text = [
        ("Name", "text9"),
        ("Sex", "text96"),
        ("Country/Place of birth", "short_text"),
        ("Race", "text_17"),
        ("License Number", "text8"),
        ("Classes", "text_13"),
        ("Vehicle No", "text_1195"),
        ("Make", "text2"),
        ("Model", "text6"),
        ("Vehicle Type", "text_1140"),
        ("Vehicle Attachment 1", "text_18"),
        ("Vehicle Scheme", "text_157"),
        ("Chassis No", "text775"),
        ("Propellant", "text_153"),
        ("Engine No", "engine_number"),
        ("Motor No", "text_155"),
        ("Engine Capacity", "text_12"),
        ("Power Rating", "text_156"),
        ("Maximum Power Output", "text_10"),
        ("Maximum Laden Weight", "text_15"),
        ("Unladen Weight", "text_14"),
        ("Year Of Manufacture", "text_11"),
        ("COE Category", "text_171"),
        ("PQP Paid", "text_114"),
        ("Road Tax Expiry Date", "date57"),
    ];
    let dates = [
        ("Date of birth", "text99"),
        ("Issue Date", "date988"),
        ("Valid From", "date4"),
        ("Valid To", "date5"),
        ("Original Registration Date", "date8"),
        ("COE Expiry Date", "date1"),
        ("PARF Eligibility Expiry Date", "date44"),
        ("Inspection Due Date", "date7"),
        ("Intended Transfer Date", "date75"),
    ];

    text.iter()
        .map(|(field, id)| (field.to_string(), ColumnSpec::text(*id)))
        .chain(dates.iter().map(|(field, id)| (field.to_string(), ColumnSpec::date(*id))))
        .collect()
}

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: IntakeConfig) -> IntakeConfig {
    let config = apply_prompt_defaults(config);
    let config = apply_session_defaults(config);
    let config = apply_inference_defaults(config);
    let config = apply_image_defaults(config);
    let config = apply_workbook_defaults(config);
    apply_logging_defaults(config)
}

/// Fill unset or blank prompts with the built-in templates.
fn apply_prompt_defaults(mut config: IntakeConfig) -> IntakeConfig {
    let prompts = config.prompts.get_or_insert_with(PromptsConfig::default);
    for kind in DocumentKind::ALL {
        let slot = match kind {
            DocumentKind::IdentityCard => &mut prompts.identity_card,
            DocumentKind::DriversLicense => &mut prompts.drivers_license,
            DocumentKind::LogCard => &mut prompts.log_card,
        };
        if slot.as_deref().map(str::trim).unwrap_or("").is_empty() {
            *slot = Some(default_prompt(kind).to_string());
        }
    }
    config
}

/// Required kinds keep their first occurrence only; retry and timeout limits are set.
fn apply_session_defaults(mut config: IntakeConfig) -> IntakeConfig {
    let session = config.session.get_or_insert_with(SessionConfig::default);

    let kinds = session
        .required_kinds
        .get_or_insert_with(|| DocumentKind::ALL.to_vec());
    let mut seen = Vec::with_capacity(kinds.len());
    kinds.retain(|kind| {
        if seen.contains(kind) {
            false
        } else {
            seen.push(*kind);
            true
        }
    });

    if session.max_retries.is_none() {
        session.max_retries = Some(DEFAULT_MAX_RETRIES);
    }
    if session.idle_timeout_secs.is_none() {
        session.idle_timeout_secs = Some(DEFAULT_IDLE_TIMEOUT_SECS);
    }
    if session.details.is_none() {
        session.details = Some(Vec::new());
    }
    config
}

fn apply_inference_defaults(mut config: IntakeConfig) -> IntakeConfig {
    let inference = config.inference.get_or_insert_with(InferenceConfig::default);
    if inference.timeout_secs.is_none() {
        inference.timeout_secs = Some(DEFAULT_INFERENCE_TIMEOUT_SECS);
    }
    if inference.max_concurrent.is_none() {
        inference.max_concurrent = Some(DEFAULT_MAX_CONCURRENT);
    }
    config
}

fn apply_image_defaults(mut config: IntakeConfig) -> IntakeConfig {
    let image = config.image.get_or_insert_with(ImageConfig::default);
    image.min_width.get_or_insert(DEFAULT_MIN_IMAGE_SIDE);
    image.min_height.get_or_insert(DEFAULT_MIN_IMAGE_SIDE);
    image.min_bytes.get_or_insert(DEFAULT_MIN_IMAGE_BYTES);
    image.max_bytes.get_or_insert(DEFAULT_MAX_IMAGE_BYTES);
    if image.allowed_formats.is_none() {
        image.allowed_formats = Some(default_allowed_formats());
    }
    config
}

/// Only touches an explicitly configured workbook.
fn apply_workbook_defaults(mut config: IntakeConfig) -> IntakeConfig {
    if let Some(workbook) = &mut config.workbook {
        if workbook.api_url.is_none() {
            workbook.api_url = Some(DEFAULT_MONDAY_API_URL.to_string());
        }
        if workbook.api_version.is_none() {
            workbook.api_version = Some(DEFAULT_MONDAY_API_VERSION.to_string());
        }
        if workbook.columns.is_none() {
            workbook.columns = Some(default_workbook_columns());
        }
    }
    config
}

fn apply_logging_defaults(mut config: IntakeConfig) -> IntakeConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    if logging.level.is_none() {
        logging.level = Some(DEFAULT_LOG_LEVEL.to_string());
    }
    config
}
