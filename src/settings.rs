//! Remote event settings document.
//!
//! The document is a flat JSON object written by the publishing front-end.
//! Every field is optional; a missing field takes its default while a
//! present field that fails its check rejects the whole document.

use alloc::{
    string::{String, ToString},
    vec::Vec,
};

use chrono::{NaiveDate, NaiveTime};
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    calendar::{self, DATE_FORMAT, TIME_FORMAT, days_between},
    color::{Rgb, format_rgb, parse_rgb},
    error::RemoteDataError,
};

/// Accepted blink half-period, in seconds
pub const FLASH_SPEED_RANGE: core::ops::RangeInclusive<i64> = 1..=3600;

/// Longest accepted update channel name
pub const MAX_BRANCH_LEN: usize = 64;

/// Validated event configuration.
///
/// Instances are never mutated after parsing. A refresh builds a new one
/// and swaps it in whole.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSettings {
    pub important_date: NaiveDate,
    pub start_from_day: NaiveDate,
    pub primary_color: Rgb,
    pub secondary_color: Rgb,
    pub use_custom_colors: bool,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Block 0 sits at the controller end of the strip
    pub from_pi: bool,
    pub is_reverse: bool,
    pub with_marker: bool,
    pub marker_color: Rgb,
    pub is_flashing: bool,
    /// Blink half-period in seconds
    pub flash_speed: u32,
    pub auto_update: bool,
    pub update_branch: String,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            important_date: NaiveDate::from_ymd_opt(2025, 12, 25).unwrap_or_default(),
            start_from_day: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap_or_default(),
            primary_color: Rgb { r: 255, g: 0, b: 0 },
            secondary_color: Rgb { r: 0, g: 255, b: 0 },
            use_custom_colors: false,
            start_time: NaiveTime::MIN,
            end_time: NaiveTime::from_hms_opt(23, 59, 0).unwrap_or_default(),
            from_pi: false,
            is_reverse: false,
            with_marker: true,
            marker_color: Rgb {
                r: 255,
                g: 255,
                b: 255,
            },
            is_flashing: true,
            flash_speed: 2,
            auto_update: true,
            update_branch: "main".to_string(),
        }
    }
}

/// Wire shape of the settings document
#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsDocument {
    #[serde(rename = "ImportantDate", skip_serializing_if = "Option::is_none")]
    important_date: Option<String>,
    #[serde(rename = "StartFromDay", skip_serializing_if = "Option::is_none")]
    start_from_day: Option<String>,
    #[serde(rename = "PrimaryRGBColor", skip_serializing_if = "Option::is_none")]
    primary_color: Option<String>,
    #[serde(rename = "SecondaryRGBColor", skip_serializing_if = "Option::is_none")]
    secondary_color: Option<String>,
    #[serde(rename = "UseCustomColors", skip_serializing_if = "Option::is_none")]
    use_custom_colors: Option<bool>,
    #[serde(rename = "StartTime", skip_serializing_if = "Option::is_none")]
    start_time: Option<String>,
    #[serde(rename = "EndTime", skip_serializing_if = "Option::is_none")]
    end_time: Option<String>,
    #[serde(rename = "FromPi", skip_serializing_if = "Option::is_none")]
    from_pi: Option<bool>,
    #[serde(rename = "IsReverse", skip_serializing_if = "Option::is_none")]
    is_reverse: Option<bool>,
    #[serde(rename = "WithMarker", skip_serializing_if = "Option::is_none")]
    with_marker: Option<bool>,
    #[serde(rename = "MarkerRGBColor", skip_serializing_if = "Option::is_none")]
    marker_color: Option<String>,
    #[serde(rename = "IsFlashing", skip_serializing_if = "Option::is_none")]
    is_flashing: Option<bool>,
    #[serde(rename = "FlashSpeed", skip_serializing_if = "Option::is_none")]
    flash_speed: Option<i64>,
    #[serde(rename = "flash_speed", skip_serializing)]
    flash_speed_snake: Option<i64>,
    #[serde(rename = "AutoUpdate", skip_serializing_if = "Option::is_none")]
    auto_update: Option<bool>,
    #[serde(rename = "auto_update", skip_serializing)]
    auto_update_snake: Option<bool>,
    #[serde(rename = "UpdateBranch", skip_serializing_if = "Option::is_none")]
    update_branch: Option<String>,
    #[serde(rename = "update_branch", skip_serializing)]
    update_branch_snake: Option<String>,
}

fn invalid(field: &'static str, reason: impl ToString) -> RemoteDataError {
    RemoteDataError::InvalidField {
        field,
        reason: reason.to_string(),
    }
}

fn date_field(field: &'static str, value: Option<String>, default: NaiveDate) -> Result<NaiveDate, RemoteDataError> {
    match value {
        None => Ok(default),
        Some(text) => calendar::parse_date(&text)
            .ok_or_else(|| invalid(field, alloc::format!("`{text}` is not YYYY-MM-DD"))),
    }
}

fn time_field(field: &'static str, value: Option<String>, default: NaiveTime) -> Result<NaiveTime, RemoteDataError> {
    match value {
        None => Ok(default),
        Some(text) => calendar::parse_time_of_day(&text)
            .ok_or_else(|| invalid(field, alloc::format!("`{text}` is not HH:MM"))),
    }
}

fn color_field(field: &'static str, value: Option<String>, default: Rgb) -> Result<Rgb, RemoteDataError> {
    match value {
        None => Ok(default),
        Some(text) => parse_rgb(&text).map_err(|err| invalid(field, err)),
    }
}

fn branch_is_valid(branch: &str) -> bool {
    !branch.is_empty()
        && branch.len() <= MAX_BRANCH_LEN
        && !branch.contains("..")
        && branch
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
}

impl EventSettings {
    /// Parse and validate a settings document
    pub fn parse(body: &[u8]) -> Result<Self, RemoteDataError> {
        let doc: SettingsDocument = serde_json::from_slice(body)?;
        let defaults = Self::default();

        let important_date = date_field("ImportantDate", doc.important_date, defaults.important_date)?;
        let start_from_day = date_field("StartFromDay", doc.start_from_day, defaults.start_from_day)?;
        let length = days_between(start_from_day, important_date);
        if length < 1 {
            return Err(RemoteDataError::EmptyCountdown(length));
        }

        let flash_speed = match doc.flash_speed_snake.or(doc.flash_speed) {
            None => defaults.flash_speed,
            Some(speed) if FLASH_SPEED_RANGE.contains(&speed) => {
                u32::try_from(speed).map_err(|err| invalid("FlashSpeed", err))?
            }
            Some(speed) => {
                return Err(invalid(
                    "FlashSpeed",
                    alloc::format!("{speed} is outside 1-3600 seconds"),
                ));
            }
        };

        let update_branch = match doc.update_branch_snake.or(doc.update_branch) {
            None => defaults.update_branch,
            Some(branch) if branch_is_valid(&branch) => branch,
            Some(branch) => {
                return Err(invalid(
                    "UpdateBranch",
                    alloc::format!("`{branch}` is not a valid channel name"),
                ));
            }
        };

        Ok(Self {
            important_date,
            start_from_day,
            primary_color: color_field("PrimaryRGBColor", doc.primary_color, defaults.primary_color)?,
            secondary_color: color_field(
                "SecondaryRGBColor",
                doc.secondary_color,
                defaults.secondary_color,
            )?,
            use_custom_colors: doc.use_custom_colors.unwrap_or(defaults.use_custom_colors),
            start_time: time_field("StartTime", doc.start_time, defaults.start_time)?,
            end_time: time_field("EndTime", doc.end_time, defaults.end_time)?,
            from_pi: doc.from_pi.unwrap_or(defaults.from_pi),
            is_reverse: doc.is_reverse.unwrap_or(defaults.is_reverse),
            with_marker: doc.with_marker.unwrap_or(defaults.with_marker),
            marker_color: color_field("MarkerRGBColor", doc.marker_color, defaults.marker_color)?,
            is_flashing: doc.is_flashing.unwrap_or(defaults.is_flashing),
            flash_speed,
            auto_update: doc
                .auto_update_snake
                .or(doc.auto_update)
                .unwrap_or(defaults.auto_update),
            update_branch,
        })
    }

    /// Encode in the same shape [`parse`](Self::parse) accepts
    pub fn to_json(&self) -> Result<Vec<u8>, RemoteDataError> {
        let doc = SettingsDocument {
            important_date: Some(self.important_date.format(DATE_FORMAT).to_string()),
            start_from_day: Some(self.start_from_day.format(DATE_FORMAT).to_string()),
            primary_color: Some(format_rgb(self.primary_color).as_str().to_string()),
            secondary_color: Some(format_rgb(self.secondary_color).as_str().to_string()),
            use_custom_colors: Some(self.use_custom_colors),
            start_time: Some(self.start_time.format(TIME_FORMAT).to_string()),
            end_time: Some(self.end_time.format(TIME_FORMAT).to_string()),
            from_pi: Some(self.from_pi),
            is_reverse: Some(self.is_reverse),
            with_marker: Some(self.with_marker),
            marker_color: Some(format_rgb(self.marker_color).as_str().to_string()),
            is_flashing: Some(self.is_flashing),
            flash_speed: Some(i64::from(self.flash_speed)),
            auto_update: Some(self.auto_update),
            update_branch: Some(self.update_branch.clone()),
            ..SettingsDocument::default()
        };
        Ok(serde_json::to_vec(&doc)?)
    }

    /// Whole days from the start day to the event
    pub fn countdown_length(&self) -> i64 {
        days_between(self.start_from_day, self.important_date)
    }

    /// Blink half-period in milliseconds
    pub fn flash_interval_ms(&self) -> u64 {
        u64::from(self.flash_speed.max(1)) * 1000
    }

    pub fn log_fields(&self) {
        info!("  ImportantDate: {}", self.important_date);
        info!("  StartFromDay: {}", self.start_from_day);
        info!("  PrimaryRGBColor: {}", format_rgb(self.primary_color));
        info!("  SecondaryRGBColor: {}", format_rgb(self.secondary_color));
        info!("  UseCustomColors: {}", self.use_custom_colors);
        info!("  StartTime: {}", self.start_time.format(TIME_FORMAT));
        info!("  EndTime: {}", self.end_time.format(TIME_FORMAT));
        info!("  FromPi: {}", self.from_pi);
        info!("  IsReverse: {}", self.is_reverse);
        info!("  WithMarker: {}", self.with_marker);
        info!("  MarkerRGBColor: {}", format_rgb(self.marker_color));
        info!("  IsFlashing: {}", self.is_flashing);
        info!("  FlashSpeed: {}", self.flash_speed);
        info!("  AutoUpdate: {}", self.auto_update);
        info!("  UpdateBranch: {}", self.update_branch);
    }
}
