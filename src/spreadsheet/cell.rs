use crate::table::value::CellValue;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;

const MILLISECONDS_PER_DAY: f64 = 86_400_000.0;
/// Serial number of 9999-12-31, the last day Excel can display
const MAX_SERIAL: f64 = 2_958_465.999_999;

/// How a workbook counts day serial numbers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum DateSystem {
    /// Day 1 is 1900-01-01, with the fictitious 1900-02-29 inherited from Lotus 1-2-3
    #[default]
    Epoch1900,
    /// Day 0 is 1904-01-01
    Epoch1904,
}

/// What a cell's number format says about its numeric value.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum NumberFormat {
    #[default]
    General,
    Date,
    Time,
    DateTime,
}

impl NumberFormat {
    /// Built-in format ids that render dates or times.
    pub(crate) fn parse_builtin_number_format_id(id: u16) -> Option<Self> {
        match id {
            22 => Some(Self::DateTime),
            14..=17 => Some(Self::Date),
            18..=21 | 45..=47 => Some(Self::Time),
            _ => None,
        }
    }

    /// Scans a custom format code for date (`y`, `d`) and time (`h`, `s`) tokens,
    /// ignoring quoted literals, escapes and bracketed sections such as colors.
    pub(crate) fn parse_custom_number_format(format: &str) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        let mut is_time = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' if !is_literal => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time) {
            (true, true) => Self::DateTime,
            (true, false) => Self::Date,
            (false, true) => Self::Time,
            (false, false) => Self::General,
        }
    }
}

/// Resolves a stored number against its format.
///
/// Serial numbers outside the displayable range stay numeric.
pub(crate) fn number_to_value(value: f64, format: NumberFormat, date_system: DateSystem) -> CellValue {
    if format == NumberFormat::General {
        return CellValue::number(value);
    }
    let Some((datetime, has_time)) = serial_to_datetime(value, date_system) else {
        return CellValue::number(value);
    };
    match format {
        NumberFormat::Date if !has_time => CellValue::Date(datetime.date()),
        NumberFormat::Time if value < 1.0 => CellValue::Time(datetime.time()),
        _ => CellValue::DateTime(datetime),
    }
}

fn serial_to_datetime(value: f64, date_system: DateSystem) -> Option<(NaiveDateTime, bool)> {
    if !value.is_finite() || !(0.0..=MAX_SERIAL).contains(&value) {
        return None;
    }
    let total = (value * MILLISECONDS_PER_DAY).round() as i64;
    let days = total / MILLISECONDS_PER_DAY as i64;
    let milliseconds = total % MILLISECONDS_PER_DAY as i64;
    let offset = match date_system {
        DateSystem::Epoch1904 => 1462,
        DateSystem::Epoch1900 if days < 60 => 1,
        DateSystem::Epoch1900 => 0,
    };
    let date = NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(days + offset))?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(
        (milliseconds / 1000) as u32,
        (milliseconds % 1000) as u32 * 1_000_000,
    )?;
    Some((date.and_time(time), milliseconds != 0))
}

/// Parses an ISO 8601 cell value (`t="d"` cells); unparseable text is kept as text.
pub(crate) fn iso_to_value(value: &str) -> CellValue {
    let value = value.trim().trim_end_matches('Z');
    if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        if datetime.time() == NaiveTime::MIN {
            CellValue::Date(datetime.date())
        } else {
            CellValue::DateTime(datetime)
        }
    } else if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        CellValue::Date(date)
    } else if let Ok(time) = NaiveTime::parse_from_str(value, "%H:%M:%S%.f") {
        CellValue::Time(time)
    } else {
        CellValue::text(value)
    }
}

/// Converts BIFF error codes to their display literal.
pub(crate) fn to_error_value(value: u8) -> &'static str {
    match value {
        0x00 => "#NULL!",
        0x07 => "#DIV/0!",
        0x0F => "#VALUE!",
        0x17 => "#REF!",
        0x1D => "#NAME?",
        0x24 => "#NUM!",
        0x2A => "#N/A",
        0x2B => "#GETTING_DATA",
        _ => "#ERROR!",
    }
}
