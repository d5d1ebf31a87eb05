//! Historical statistics over the merged table
//!
//! Every operation accepts an optional district filter: `None`, an empty
//! string or `"All"` selects every row, any other value must match at least
//! one row.

use chrono::NaiveDate;
use crowdcast_core::records::{date_range, unique_districts};
use crowdcast_core::{assign_crowd_levels, CrowdLevel, MergedRecord, WEEKDAYS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::ServiceError;
use crate::state::AppState;

/// Filter value meaning "no filter"
pub const ALL_DISTRICTS: &str = "All";

/// District-level tables list at most this many districts
pub const DISTRICT_STATS_LIMIT: usize = 10;

const DATA_NOT_LOADED: &str = "Data not loaded";

/// Rows selected by `district`, with the label echoed in responses.
fn select<'a>(
    state: &'a AppState,
    district: Option<&str>,
) -> Result<Option<(Vec<&'a MergedRecord>, String)>, ServiceError> {
    let Some(table) = state.dataset.table() else {
        return Ok(None);
    };
    match district.map(str::trim) {
        None | Some("") | Some(ALL_DISTRICTS) => {
            Ok(Some((table.select(None), ALL_DISTRICTS.to_string())))
        }
        Some(name) => {
            let rows = table.select(Some(name));
            if rows.is_empty() {
                return Err(ServiceError::district_not_found(name));
            }
            Ok(Some((rows, name.to_string())))
        }
    }
}

fn mean(sum: f64, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_records: usize,
    /// Tertiles computed over the selected rows only
    pub crowd_distribution: BTreeMap<CrowdLevel, usize>,
    pub avg_biometric: f64,
    pub avg_enrolment: f64,
    pub districts: Vec<String>,
    pub date_range: Option<DateRange>,
    pub total_biometric: i64,
    pub total_enrolment: i64,
    pub district: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Statistics {
    fn unavailable(district: Option<&str>) -> Self {
        Self {
            total_records: 0,
            crowd_distribution: BTreeMap::new(),
            avg_biometric: 0.0,
            avg_enrolment: 0.0,
            districts: Vec::new(),
            date_range: None,
            total_biometric: 0,
            total_enrolment: 0,
            district: district.unwrap_or(ALL_DISTRICTS).to_string(),
            error: Some(DATA_NOT_LOADED.to_string()),
        }
    }
}

pub fn statistics(state: &AppState, district: Option<&str>) -> Result<Statistics, ServiceError> {
    let Some((rows, label)) = select(state, district)? else {
        return Ok(Statistics::unavailable(district));
    };

    let biometric: Vec<f64> = rows.iter().map(|r| r.total_biometric).collect();
    let total_biometric: f64 = biometric.iter().sum();
    let total_enrolment: f64 = rows.iter().map(|r| r.total_enrolment).sum();

    Ok(Statistics {
        total_records: rows.len(),
        crowd_distribution: assign_crowd_levels(&biometric).distribution(),
        avg_biometric: mean(total_biometric, rows.len()),
        avg_enrolment: mean(total_enrolment, rows.len()),
        districts: unique_districts(rows.iter().copied()),
        date_range: date_range(rows.iter().copied()).map(|(start, end)| DateRange { start, end }),
        total_biometric: total_biometric as i64,
        total_enrolment: total_enrolment as i64,
        district: label,
        error: None,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTotal {
    pub year: i32,
    pub month: u32,
    /// `YYYY-MM`
    pub year_month: String,
    pub total_biometric: f64,
    pub total_enrolment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trends {
    /// Chronological
    pub monthly: Vec<MonthlyTotal>,
    /// Biometric sum per weekday name, observed weekdays only
    pub by_day: BTreeMap<String, f64>,
    pub district: String,
    pub total_records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn trends(state: &AppState, district: Option<&str>) -> Result<Trends, ServiceError> {
    let Some((rows, label)) = select(state, district)? else {
        return Ok(Trends {
            monthly: Vec::new(),
            by_day: BTreeMap::new(),
            district: district.unwrap_or(ALL_DISTRICTS).to_string(),
            total_records: 0,
            error: Some(DATA_NOT_LOADED.to_string()),
        });
    };

    let mut months: BTreeMap<(i32, u32), (f64, f64)> = BTreeMap::new();
    let mut by_day: BTreeMap<String, f64> = BTreeMap::new();
    for r in &rows {
        let entry = months.entry((r.year(), r.month())).or_default();
        entry.0 += r.total_biometric;
        entry.1 += r.total_enrolment;
        *by_day.entry(r.day_of_week().to_string()).or_default() += r.total_biometric;
    }

    let monthly = months
        .into_iter()
        .map(|((year, month), (total_biometric, total_enrolment))| MonthlyTotal {
            year,
            month,
            year_month: format!("{year:04}-{month:02}"),
            total_biometric,
            total_enrolment,
        })
        .collect();

    Ok(Trends {
        monthly,
        by_day,
        district: label,
        total_records: rows.len(),
        error: None,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictList {
    pub districts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn districts(state: &AppState) -> DistrictList {
    match state.dataset.table() {
        Some(table) => DistrictList {
            districts: table.districts(),
            error: None,
        },
        None => DistrictList {
            districts: Vec::new(),
            error: Some(DATA_NOT_LOADED.to_string()),
        },
    }
}

/// Rounded mean counts for one weekday
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayAverages {
    pub age_0_5: i64,
    pub age_5_17: i64,
    pub age_18_plus: i64,
    pub bio_age_5_17: i64,
    pub bio_age_18_plus: i64,
}

impl DayAverages {
    const fn new(values: [i64; 5]) -> Self {
        Self {
            age_0_5: values[0],
            age_5_17: values[1],
            age_18_plus: values[2],
            bio_age_5_17: values[3],
            bio_age_18_plus: values[4],
        }
    }
}

/// Used for a weekday with no rows in an otherwise known district
pub const DEFAULT_DAY: DayAverages = DayAverages::new([1, 3, 8, 5, 12]);

/// Whole-week profile used when a district has no rows at all
pub const FALLBACK_WEEK: [DayAverages; 7] = [
    DayAverages::new([1, 3, 8, 5, 12]),
    DayAverages::new([2, 4, 10, 6, 14]),
    DayAverages::new([1, 2, 6, 4, 9]),
    DayAverages::new([2, 5, 12, 8, 16]),
    DayAverages::new([2, 4, 11, 7, 15]),
    DayAverages::new([2, 5, 13, 9, 17]),
    DayAverages::new([0, 1, 3, 2, 5]),
];

/// One entry per weekday, serialised Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WeeklyAverages {
    pub monday: DayAverages,
    pub tuesday: DayAverages,
    pub wednesday: DayAverages,
    pub thursday: DayAverages,
    pub friday: DayAverages,
    pub saturday: DayAverages,
    pub sunday: DayAverages,
}

impl WeeklyAverages {
    /// Build from values in [`WEEKDAYS`] order.
    pub fn from_days(days: [DayAverages; 7]) -> Self {
        let [monday, tuesday, wednesday, thursday, friday, saturday, sunday] = days;
        Self {
            monday,
            tuesday,
            wednesday,
            thursday,
            friday,
            saturday,
            sunday,
        }
    }

    pub fn get(&self, weekday: &str) -> Option<&DayAverages> {
        match weekday {
            "Monday" => Some(&self.monday),
            "Tuesday" => Some(&self.tuesday),
            "Wednesday" => Some(&self.wednesday),
            "Thursday" => Some(&self.thursday),
            "Friday" => Some(&self.friday),
            "Saturday" => Some(&self.saturday),
            "Sunday" => Some(&self.sunday),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictAverages {
    pub district: String,
    pub averages: WeeklyAverages,
    pub data_available: bool,
    pub records_analyzed: usize,
}

/// Per-weekday mean age counts for a district, rounded half to even.
///
/// Unknown districts and unloaded data fall back to a fixed profile with
/// `data_available = false`.
pub fn district_averages(state: &AppState, district: &str) -> DistrictAverages {
    let rows = match select(state, Some(district)) {
        Ok(Some((rows, _))) => rows,
        Ok(None) | Err(_) => {
            return DistrictAverages {
                district: district.to_string(),
                averages: WeeklyAverages::from_days(FALLBACK_WEEK),
                data_available: false,
                records_analyzed: 0,
            }
        }
    };

    let mut sums = [[0f64; 5]; 7];
    let mut counts = [0usize; 7];
    for r in &rows {
        let Some(day) = WEEKDAYS.iter().position(|d| *d == r.day_of_week()) else {
            continue;
        };
        let values = [
            r.age_0_5,
            r.age_5_17,
            r.age_18_plus,
            r.bio_age_5_17,
            r.bio_age_18_plus,
        ];
        for (sum, v) in sums[day].iter_mut().zip(values) {
            *sum += v;
        }
        counts[day] += 1;
    }

    let mut days = [DEFAULT_DAY; 7];
    for (day, slot) in days.iter_mut().enumerate() {
        if counts[day] > 0 {
            *slot = DayAverages::new(
                sums[day].map(|s| (s / counts[day] as f64).round_ties_even() as i64),
            );
        }
    }

    DistrictAverages {
        district: district.to_string(),
        averages: WeeklyAverages::from_days(days),
        data_available: true,
        records_analyzed: rows.len(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictTotals {
    pub district: String,
    pub total_enrolment: f64,
    pub total_biometric: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DayMeans {
    pub total_enrolment: f64,
    pub total_biometric: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyCrowd {
    pub month: u32,
    pub crowd_level: CrowdLevel,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    /// First districts in name order
    pub district_stats: Vec<DistrictTotals>,
    pub day_analysis: BTreeMap<String, DayMeans>,
    /// Observed (month, level) combinations only
    pub monthly_crowd: Vec<MonthlyCrowd>,
    pub total_enrolment: i64,
    pub total_biometric: i64,
    /// Month with the largest enrolment sum; lowest month on ties
    pub peak_month: Option<u32>,
    /// Weekday with the most rows; alphabetically first on ties
    pub peak_day: Option<String>,
    pub district: String,
}

pub fn analytics(state: &AppState, district: Option<&str>) -> Result<Analytics, ServiceError> {
    let (rows, label) = select(state, district)?
        .ok_or_else(|| ServiceError::Unavailable(DATA_NOT_LOADED.into()))?;

    let mut by_district: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    let mut by_day: BTreeMap<&str, (f64, f64, usize)> = BTreeMap::new();
    let mut by_month: BTreeMap<u32, f64> = BTreeMap::new();
    for r in &rows {
        let d = by_district.entry(r.district.as_str()).or_default();
        d.0 += r.total_enrolment;
        d.1 += r.total_biometric;

        let w = by_day.entry(r.day_of_week()).or_default();
        w.0 += r.total_enrolment;
        w.1 += r.total_biometric;
        w.2 += 1;

        *by_month.entry(r.month()).or_default() += r.total_enrolment;
    }

    let biometric: Vec<f64> = rows.iter().map(|r| r.total_biometric).collect();
    let levels = assign_crowd_levels(&biometric).levels;
    let mut crowd: BTreeMap<(u32, CrowdLevel), usize> = BTreeMap::new();
    for (r, level) in rows.iter().zip(levels) {
        *crowd.entry((r.month(), level)).or_default() += 1;
    }

    let peak_month = by_month
        .iter()
        .fold(None, |best: Option<(u32, f64)>, (&m, &sum)| match best {
            Some((_, top)) if top >= sum => best,
            _ => Some((m, sum)),
        })
        .map(|(m, _)| m);
    let peak_day = by_day
        .iter()
        .fold(None, |best: Option<(&str, usize)>, (&day, &(_, _, n))| match best {
            Some((_, top)) if top >= n => best,
            _ => Some((day, n)),
        })
        .map(|(day, _)| day.to_string());

    Ok(Analytics {
        district_stats: by_district
            .iter()
            .take(DISTRICT_STATS_LIMIT)
            .map(|(name, (enrolment, biometric))| DistrictTotals {
                district: name.to_string(),
                total_enrolment: *enrolment,
                total_biometric: *biometric,
            })
            .collect(),
        day_analysis: by_day
            .iter()
            .map(|(day, (enrolment, biometric, n))| {
                (
                    day.to_string(),
                    DayMeans {
                        total_enrolment: mean(*enrolment, *n),
                        total_biometric: mean(*biometric, *n),
                    },
                )
            })
            .collect(),
        monthly_crowd: crowd
            .into_iter()
            .map(|((month, crowd_level), count)| MonthlyCrowd {
                month,
                crowd_level,
                count,
            })
            .collect(),
        total_enrolment: by_district.values().map(|v| v.0).sum::<f64>() as i64,
        total_biometric: biometric.iter().sum::<f64>() as i64,
        peak_month,
        peak_day,
        district: label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::state::{DataStatus, ModelStatus};
    use crowdcast_core::{MergedRecord, MergedTable};

    fn row(date: &str, district: &str, ages: [f64; 3], bio: [f64; 2]) -> MergedRecord {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        MergedRecord {
            date,
            state: "Andhra Pradesh".into(),
            district: district.into(),
            pincode: "522001".into(),
            age_0_5: ages[0],
            age_5_17: ages[1],
            age_18_plus: ages[2],
            bio_age_5_17: bio[0],
            bio_age_18_plus: bio[1],
            total_enrolment: ages.iter().sum(),
            total_biometric: bio.iter().sum(),
        }
    }

    fn state(rows: Vec<MergedRecord>) -> AppState {
        AppState::from_parts(
            ServiceConfig::default(),
            DataStatus::Loaded(MergedTable::new(rows)),
            ModelStatus::Unavailable("no model".into()),
        )
    }

    fn unloaded() -> AppState {
        AppState::from_parts(
            ServiceConfig::default(),
            DataStatus::Unavailable("missing".into()),
            ModelStatus::Unavailable("no model".into()),
        )
    }

    fn sample() -> AppState {
        state(vec![
            // 2025-01-15 is a Wednesday
            row("2025-01-15", "Guntur", [5.0, 10.0, 20.0], [8.0, 15.0]),
            row("2025-01-22", "Guntur", [1.0, 2.0, 3.0], [1.0, 1.0]),
            row("2025-02-03", "Krishna", [0.0, 4.0, 4.0], [10.0, 30.0]),
        ])
    }

    #[test]
    fn test_statistics_all_and_filtered() {
        let state = sample();
        let all = statistics(&state, None).unwrap();
        assert_eq!(all.total_records, 3);
        assert_eq!(all.district, "All");
        assert_eq!(all.total_enrolment, 49);
        assert_eq!(all.total_biometric, 65);
        assert_eq!(all.districts, vec!["Guntur", "Krishna"]);
        assert_eq!(all.crowd_distribution.values().sum::<usize>(), 3);
        assert_eq!(
            all.date_range.unwrap().end,
            NaiveDate::from_ymd_opt(2025, 2, 3).unwrap()
        );

        let guntur = statistics(&state, Some("Guntur")).unwrap();
        assert_eq!(guntur.total_records, 2);
        assert_eq!(guntur.avg_biometric, 12.5);
        assert_eq!(guntur.district, "Guntur");
    }

    #[test]
    fn test_unknown_district_is_not_found() {
        let err = statistics(&sample(), Some("Atlantis")).unwrap_err();
        assert_eq!(err.to_string(), "No data found for district: Atlantis");
        assert!(trends(&sample(), Some("Atlantis")).is_err());
        assert!(analytics(&sample(), Some("Atlantis")).is_err());
    }

    #[test]
    fn test_empty_table_statistics() {
        let stats = statistics(&state(vec![]), Some("All")).unwrap();
        assert_eq!(stats.total_records, 0);
        assert!(stats.crowd_distribution.is_empty());
        assert_eq!(stats.avg_biometric, 0.0);
        assert!(stats.date_range.is_none());
        assert!(stats.error.is_none());
    }

    #[test]
    fn test_unloaded_data_degrades() {
        let state = unloaded();
        let stats = statistics(&state, None).unwrap();
        assert_eq!(stats.error.as_deref(), Some("Data not loaded"));
        assert_eq!(stats.total_records, 0);

        assert!(trends(&state, None).unwrap().error.is_some());
        assert!(districts(&state).districts.is_empty());
        assert!(!district_averages(&state, "Guntur").data_available);
        assert!(analytics(&state, None).is_err());
    }

    #[test]
    fn test_trends_group_by_month_and_weekday() {
        let t = trends(&sample(), None).unwrap();
        assert_eq!(t.monthly.len(), 2);
        assert_eq!(t.monthly[0].year_month, "2025-01");
        assert_eq!(t.monthly[0].total_biometric, 25.0);
        assert_eq!(t.monthly[1].total_enrolment, 8.0);
        assert_eq!(t.by_day["Wednesday"], 25.0);
        assert_eq!(t.by_day["Monday"], 40.0);
    }

    #[test]
    fn test_district_averages_round_half_even() {
        let state = state(vec![
            row("2025-01-15", "Guntur", [1.0, 2.0, 3.0], [4.0, 5.0]),
            row("2025-01-22", "Guntur", [2.0, 3.0, 4.0], [5.0, 6.0]),
        ]);
        let avg = district_averages(&state, "Guntur");
        assert!(avg.data_available);
        assert_eq!(avg.records_analyzed, 2);
        // 1.5 -> 2, 2.5 -> 2, 3.5 -> 4, 4.5 -> 4, 5.5 -> 6
        assert_eq!(avg.averages.wednesday, DayAverages::new([2, 2, 4, 4, 6]));
        assert_eq!(avg.averages.monday, DEFAULT_DAY);
    }

    #[test]
    fn test_district_averages_fallback_for_unknown_district() {
        let avg = district_averages(&sample(), "Atlantis");
        assert!(!avg.data_available);
        assert_eq!(avg.averages.sunday, DayAverages::new([0, 1, 3, 2, 5]));
        assert_eq!(avg.averages.get("Thursday"), Some(&FALLBACK_WEEK[3]));

        let json = serde_json::to_value(&avg).unwrap();
        assert_eq!(json["averages"]["Saturday"]["bio_age_18_plus"], 17);
    }

    #[test]
    fn test_analytics_summary() {
        let a = analytics(&sample(), None).unwrap();
        assert_eq!(a.district_stats.len(), 2);
        assert_eq!(a.district_stats[0].district, "Guntur");
        assert_eq!(a.district_stats[0].total_enrolment, 41.0);
        assert_eq!(a.total_enrolment, 49);
        assert_eq!(a.peak_month, Some(1));
        assert_eq!(a.peak_day.as_deref(), Some("Wednesday"));
        assert_eq!(a.day_analysis["Wednesday"].total_biometric, 12.5);
        assert_eq!(a.monthly_crowd.iter().map(|m| m.count).sum::<usize>(), 3);
    }

    #[test]
    fn test_peak_day_tie_goes_to_first_name() {
        let state = state(vec![
            row("2025-01-13", "Guntur", [0.0; 3], [1.0, 0.0]), // Monday
            row("2025-01-17", "Guntur", [0.0; 3], [2.0, 0.0]), // Friday
        ]);
        let a = analytics(&state, Some("Guntur")).unwrap();
        assert_eq!(a.peak_day.as_deref(), Some("Friday"));
    }
}
