//! crates/agrigenius_core/src/weather.rs
//!
//! Turns the raw parallel-array forecast into a display-ready `WeatherSnapshot`.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Utc, Weekday};

use crate::domain::{CurrentConditions, DailyForecast, HourlyForecast, RawForecast, WeatherSnapshot};
use crate::language::LanguageCode;
use crate::ports::{PortError, PortResult};

/// Number of hourly entries shown from the current hour onwards.
pub const HOURLY_WINDOW: usize = 8;

/// WMO weather interpretation codes: (code, English, Hindi).
const CONDITIONS: &[(u16, &str, &str)] = &[
    (0, "Clear sky", "साफ आसमान"),
    (1, "Mainly clear", "मुख्य रूप से साफ"),
    (2, "Partly cloudy", "आंशिक रूप से बादल"),
    (3, "Overcast", "घने बादल"),
    (45, "Fog", "कोहरा"),
    (48, "Rime fog", "जमने वाला कोहरा"),
    (51, "Light Drizzle", "हलकी बूंदाबांदी"),
    (53, "Moderate Drizzle", "मध्यम बूंदाबांदी"),
    (55, "Dense Drizzle", "घनी बूंदाबांदी"),
    (61, "Slight Rain", "हलकी बारिश"),
    (63, "Moderate Rain", "मध्यम बारिश"),
    (65, "Heavy Rain", "भारी बारिश"),
    (71, "Slight Snow", "हलकी बर्फबारी"),
    (73, "Moderate Snow", "मध्यम बर्फबारी"),
    (75, "Heavy Snow", "भारी बर्फबारी"),
    (80, "Slight Rain Showers", "हलकी बौछारें"),
    (81, "Moderate Rain Showers", "मध्यम बौछारें"),
    (82, "Violent Rain Showers", "तेज बौछारें"),
    (95, "Thunderstorm", "आंधी-तूफान"),
    (96, "Thunderstorm with Hail", "ओलावृष्टि के साथ आंधी"),
    (99, "Thunderstorm with Hail", "ओलावृष्टि के साथ आंधी"),
];

const FALLBACK_CONDITION: &str = "Cloudy";

/// Maps a WMO code to a label. Only Hindi has its own column; every other
/// language reads the English one.
pub fn condition_label(code: u16, language: LanguageCode) -> &'static str {
    CONDITIONS
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|(_, en, hi)| if language == LanguageCode::Hi { *hi } else { *en })
        .unwrap_or(FALLBACK_CONDITION)
}

/// Index of the last hourly timestamp at or before `now_local`, or 0 if every
/// entry lies in the future.
pub fn current_hour_index(times: &[NaiveDateTime], now_local: NaiveDateTime) -> usize {
    times
        .iter()
        .rposition(|t| *t <= now_local)
        .unwrap_or(0)
}

/// Builds the snapshot shown on the weather screen.
pub fn build_snapshot(
    raw: &RawForecast,
    now: DateTime<Utc>,
    language: LanguageCode,
) -> PortResult<WeatherSnapshot> {
    validate(raw)?;

    let hourly = &raw.hourly;
    let now_local = (now + Duration::seconds(i64::from(raw.utc_offset_seconds))).naive_utc();
    let index = current_hour_index(&hourly.time, now_local);

    let current = CurrentConditions {
        temperature: hourly.temperature[index],
        condition: condition_label(hourly.weather_code[index], language).to_string(),
        humidity: hourly.humidity[index],
        wind_speed: hourly.wind_speed[index],
    };

    let end = (index + HOURLY_WINDOW).min(hourly.time.len());
    let upcoming = (index..end)
        .map(|i| HourlyForecast {
            time: hour_label(hourly.time[i]),
            temperature: hourly.temperature[i],
            condition: condition_label(hourly.weather_code[i], language).to_string(),
        })
        .collect();

    let daily = &raw.daily;
    let days = (0..daily.date.len())
        .map(|i| DailyForecast {
            day: weekday_name(daily.date[i], language).to_string(),
            min_temp: daily.temperature_min[i],
            max_temp: daily.temperature_max[i],
            condition: condition_label(daily.weather_code[i], language).to_string(),
        })
        .collect();

    Ok(WeatherSnapshot {
        current,
        hourly: upcoming,
        daily: days,
    })
}

fn validate(raw: &RawForecast) -> PortResult<()> {
    let hourly = &raw.hourly;
    let hours = hourly.time.len();
    if hours == 0 {
        return Err(PortError::MalformedResponse(
            "forecast has no hourly entries".to_string(),
        ));
    }
    if [
        hourly.temperature.len(),
        hourly.humidity.len(),
        hourly.weather_code.len(),
        hourly.wind_speed.len(),
    ]
    .iter()
    .any(|len| *len != hours)
    {
        return Err(PortError::MalformedResponse(
            "hourly series have different lengths".to_string(),
        ));
    }

    let daily = &raw.daily;
    let days = daily.date.len();
    if [
        daily.weather_code.len(),
        daily.temperature_max.len(),
        daily.temperature_min.len(),
    ]
    .iter()
    .any(|len| *len != days)
    {
        return Err(PortError::MalformedResponse(
            "daily series have different lengths".to_string(),
        ));
    }
    Ok(())
}

/// "12 AM", "3 PM", ...
fn hour_label(time: NaiveDateTime) -> String {
    let hour = time.hour();
    let suffix = if hour < 12 { "AM" } else { "PM" };
    let twelve = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{twelve} {suffix}")
}

fn weekday_name(date: NaiveDate, language: LanguageCode) -> &'static str {
    let weekday = date.weekday();
    if language == LanguageCode::Hi {
        return match weekday {
            Weekday::Mon => "सोमवार",
            Weekday::Tue => "मंगलवार",
            Weekday::Wed => "बुधवार",
            Weekday::Thu => "गुरुवार",
            Weekday::Fri => "शुक्रवार",
            Weekday::Sat => "शनिवार",
            Weekday::Sun => "रविवार",
        };
    }
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DailySeries, HourlySeries};
    use chrono::TimeZone;

    fn forecast(hours: usize) -> RawForecast {
        let start = NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let time: Vec<_> = (0..hours)
            .map(|h| start + Duration::hours(h as i64))
            .collect();
        RawForecast {
            utc_offset_seconds: 19_800,
            hourly: HourlySeries {
                temperature: (0..hours).map(|h| 20.0 + h as f64).collect(),
                humidity: vec![60.0; hours],
                weather_code: vec![61; hours],
                wind_speed: vec![7.5; hours],
                time,
            },
            daily: DailySeries {
                date: (0..5)
                    .map(|d| NaiveDate::from_ymd_opt(2024, 6, 3 + d).unwrap())
                    .collect(),
                weather_code: vec![0, 3, 95, 61, 42],
                temperature_max: vec![31.0; 5],
                temperature_min: vec![21.0; 5],
            },
        }
    }

    #[test]
    fn known_codes_are_localized_and_unknown_codes_fall_back() {
        assert_eq!(condition_label(0, LanguageCode::En), "Clear sky");
        assert_eq!(condition_label(0, LanguageCode::Hi), "साफ आसमान");
        assert_eq!(condition_label(95, LanguageCode::Ta), "Thunderstorm");
        assert_eq!(condition_label(42, LanguageCode::En), "Cloudy");
    }

    #[test]
    fn current_hour_is_last_entry_not_after_now() {
        let raw = forecast(24);
        let at = |h: u32, m: u32| {
            NaiveDate::from_ymd_opt(2024, 6, 3)
                .unwrap()
                .and_hms_opt(h, m, 0)
                .unwrap()
        };
        assert_eq!(current_hour_index(&raw.hourly.time, at(5, 0)), 5);
        assert_eq!(current_hour_index(&raw.hourly.time, at(5, 59)), 5);
        assert_eq!(current_hour_index(&raw.hourly.time, at(23, 30)), 23);

        let earlier = NaiveDate::from_ymd_opt(2024, 6, 2)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(current_hour_index(&raw.hourly.time, earlier), 0);
    }

    #[test]
    fn snapshot_has_five_days_and_eight_hours() {
        let raw = forecast(120);
        // 04:30 UTC is 10:00 local with the +05:30 offset.
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 4, 30, 0).unwrap();

        let snapshot = build_snapshot(&raw, now, LanguageCode::En).unwrap();

        assert_eq!(snapshot.daily.len(), 5);
        assert_eq!(snapshot.hourly.len(), HOURLY_WINDOW);
        assert_eq!(snapshot.current.temperature, 30.0);
        assert_eq!(snapshot.current.condition, "Slight Rain");
        assert_eq!(snapshot.hourly[0].time, "10 AM");
        assert_eq!(snapshot.hourly[2].time, "12 PM");
        assert_eq!(snapshot.daily[0].day, "Monday");
        assert_eq!(snapshot.daily[4].condition, "Cloudy");
    }

    #[test]
    fn hourly_window_shrinks_at_the_end_of_the_series() {
        let raw = forecast(24);
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 15, 0, 0).unwrap(); // 20:30 local

        let snapshot = build_snapshot(&raw, now, LanguageCode::Hi).unwrap();

        assert_eq!(snapshot.hourly.len(), 4);
        assert_eq!(snapshot.hourly[0].time, "8 PM");
        assert_eq!(snapshot.daily[0].day, "सोमवार");
    }

    #[test]
    fn mismatched_series_are_malformed() {
        let mut raw = forecast(24);
        raw.hourly.humidity.pop();
        assert!(matches!(
            build_snapshot(&raw, Utc::now(), LanguageCode::En),
            Err(PortError::MalformedResponse(_))
        ));

        let empty = RawForecast {
            utc_offset_seconds: 0,
            hourly: HourlySeries::default(),
            daily: DailySeries::default(),
        };
        assert!(build_snapshot(&empty, Utc::now(), LanguageCode::En).is_err());
    }
}
