//! PDF date strings.
//!
//! Signature dictionaries record the claimed signing time in `/M` using the
//! PDF date format (ISO 32000-1:2008, Section 7.9.4):
//!
//! `D:YYYYMMDDHHmmSSOHH'mm'`
//!
//! Every field after the year is optional, `O` is one of `+`, `-` or `Z`,
//! and many writers drop the trailing apostrophe.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use nom::{
    bytes::complete::{tag, take_while_m_n},
    character::complete::one_of,
    combinator::{map_res, opt},
    IResult,
};

use crate::error::{Error, Result};

fn digits<'a>(n: usize) -> impl FnMut(&'a str) -> IResult<&'a str, u32> {
    map_res(take_while_m_n(n, n, |c: char| c.is_ascii_digit()), |s: &str| s.parse::<u32>())
}

/// Parse the UT offset; returns seconds east of UTC.
fn utc_offset(input: &str) -> IResult<&str, i32> {
    let (input, sign) = opt(one_of("+-Z"))(input)?;
    let (input, hours) = opt(digits(2))(input)?;
    let (input, _) = opt(tag("'"))(input)?;
    let (input, minutes) = opt(digits(2))(input)?;
    let (input, _) = opt(tag("'"))(input)?;

    let seconds = (hours.unwrap_or(0) * 3600 + minutes.unwrap_or(0) * 60) as i32;
    let seconds = match sign {
        Some('-') => -seconds,
        // "Z" may be followed by 00'00'
        Some('Z') | None => 0,
        _ => seconds,
    };
    Ok((input, seconds))
}

struct PdfDateFields {
    year: u32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    offset: i32,
}

fn pdf_date(input: &str) -> IResult<&str, PdfDateFields> {
    let (input, _) = opt(tag("D:"))(input)?;
    let (input, year) = digits(4)(input)?;
    let (input, month) = opt(digits(2))(input)?;
    let (input, day) = opt(digits(2))(input)?;
    let (input, hour) = opt(digits(2))(input)?;
    let (input, minute) = opt(digits(2))(input)?;
    let (input, second) = opt(digits(2))(input)?;
    let (input, offset) = utc_offset(input)?;

    Ok((
        input,
        PdfDateFields {
            year,
            month: month.unwrap_or(1),
            day: day.unwrap_or(1),
            hour: hour.unwrap_or(0),
            minute: minute.unwrap_or(0),
            second: second.unwrap_or(0),
            offset,
        },
    ))
}

/// Parse a PDF date string into UTC.
pub fn parse_pdf_date(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    let (rest, fields) =
        pdf_date(trimmed).map_err(|_| Error::InvalidDate(value.to_string()))?;
    if !rest.is_empty() {
        return Err(Error::InvalidDate(value.to_string()));
    }

    let zone = FixedOffset::east_opt(fields.offset)
        .ok_or_else(|| Error::InvalidDate(value.to_string()))?;
    zone.with_ymd_and_hms(
        fields.year as i32,
        fields.month,
        fields.day,
        fields.hour,
        fields.minute,
        fields.second,
    )
    .single()
    .map(|dt| dt.with_timezone(&Utc))
    .ok_or_else(|| Error::InvalidDate(value.to_string()))
}
