use chrono::{DateTime, Local, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};

use crate::attributes::RecordAttributeStore;
use crate::models::{AttributeId, TimeRecord};

#[derive(Debug, Clone)]
pub struct CategoryTotal {
    pub name: String,
    pub total_hours: f64,
}

#[derive(Debug, Clone)]
pub struct DomainTotal {
    pub name: String,
    pub color: Option<String>,
    pub total_hours: f64,
    pub categories: Vec<CategoryTotal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub seconds: i64,
}

pub fn record_seconds(record: &TimeRecord, now: Option<DateTime<Utc>>) -> i64 {
    let end = match (record.time_out, now) {
        (Some(time_out), _) => time_out,
        (None, Some(now)) => now,
        (None, None) => return 0,
    };
    (end - record.time_in).num_seconds().max(0)
}

pub fn summarize(
    records: &[&TimeRecord],
    attributes: &RecordAttributeStore,
    now: Option<DateTime<Utc>>,
) -> Vec<DomainTotal> {
    let mut grouped: HashMap<AttributeId, HashMap<AttributeId, i64>> = HashMap::new();

    for record in records {
        let seconds = record_seconds(record, now);
        if seconds == 0 {
            continue;
        }
        *grouped
            .entry(record.domain_id.clone())
            .or_default()
            .entry(record.category_id.clone())
            .or_insert(0) += seconds;
    }

    let mut result: Vec<DomainTotal> = grouped
        .into_iter()
        .map(|(domain_id, categories)| {
            let total_seconds: i64 = categories.values().sum();
            let mut categories: Vec<CategoryTotal> = categories
                .into_iter()
                .map(|(category_id, seconds)| CategoryTotal {
                    name: attributes.name_of(&category_id),
                    total_hours: seconds as f64 / 3600.0,
                })
                .collect();
            categories.sort_by(|a, b| {
                b.total_hours
                    .total_cmp(&a.total_hours)
                    .then_with(|| a.name.cmp(&b.name))
            });

            DomainTotal {
                name: attributes.name_of(&domain_id),
                color: attributes.color_of(&domain_id).map(str::to_string),
                total_hours: total_seconds as f64 / 3600.0,
                categories,
            }
        })
        .collect();

    result.sort_by(|a, b| {
        b.total_hours
            .total_cmp(&a.total_hours)
            .then_with(|| a.name.cmp(&b.name))
    });
    result
}

pub fn daily_totals(records: &[&TimeRecord], now: Option<DateTime<Utc>>) -> Vec<DailyTotal> {
    let mut totals: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for record in records {
        let date = record.time_in.with_timezone(&Local).date_naive();
        *totals.entry(date).or_insert(0) += record_seconds(record, now);
    }
    totals
        .into_iter()
        .map(|(date, seconds)| DailyTotal { date, seconds })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{ScriptedTransport, client_with};
    use chrono::Duration;
    use std::rc::Rc;

    fn record(domain: i64, category: i64, time_in: &str, minutes: Option<i64>) -> TimeRecord {
        let time_in: DateTime<Utc> = time_in.parse().unwrap();
        let mut record = TimeRecord::new(domain.into(), category.into(), 99.into(), time_in);
        record.time_out = minutes.map(|minutes| time_in + Duration::minutes(minutes));
        record
    }

    fn attributes() -> RecordAttributeStore {
        let transport = ScriptedTransport::new();
        transport.respond(
            200,
            r##"[
                {"id": 1, "name": "Work", "parent_id": null, "user_id": 1, "level_num": 0, "color": "#336699"},
                {"id": 2, "name": "Home", "parent_id": null, "user_id": 1, "level_num": 0, "color": null},
                {"id": 10, "name": "Meetings", "parent_id": 1, "user_id": 1, "level_num": 1, "color": null},
                {"id": 11, "name": "Coding", "parent_id": 1, "user_id": 1, "level_num": 1, "color": null}
            ]"##,
        );
        let mut store =
            RecordAttributeStore::new(Rc::new(client_with(&transport, Some("a"), Some("r"))));
        store.fetch().unwrap();
        store
    }

    #[test]
    fn groups_by_domain_and_category() {
        let records = vec![
            record(1, 10, "2026-02-03T08:00:00Z", Some(60)),
            record(1, 11, "2026-02-03T09:00:00Z", Some(90)),
            record(1, 11, "2026-02-03T11:00:00Z", Some(30)),
            record(2, 20, "2026-02-03T18:00:00Z", Some(30)),
        ];
        let refs: Vec<&TimeRecord> = records.iter().collect();
        let summary = summarize(&refs, &attributes(), None);

        assert_eq!(summary.len(), 2);
        let work = &summary[0];
        assert_eq!(work.name, "Work");
        assert_eq!(work.color.as_deref(), Some("#336699"));
        assert!((work.total_hours - 3.0).abs() < 0.001);
        assert_eq!(work.categories[0].name, "Coding");
        assert!((work.categories[0].total_hours - 2.0).abs() < 0.001);
        assert_eq!(summary[1].categories[0].name, "#20");
    }

    #[test]
    fn open_records_count_only_with_now() {
        let records = vec![record(1, 10, "2026-02-03T08:00:00Z", None)];
        let refs: Vec<&TimeRecord> = records.iter().collect();
        assert!(summarize(&refs, &attributes(), None).is_empty());

        let now: DateTime<Utc> = "2026-02-03T08:30:00Z".parse().unwrap();
        let summary = summarize(&refs, &attributes(), Some(now));
        assert!((summary[0].total_hours - 0.5).abs() < 0.001);
    }

    #[test]
    fn daily_totals_are_sorted() {
        let records = vec![
            record(1, 10, "2026-02-05T12:00:00Z", Some(30)),
            record(1, 10, "2026-02-03T12:00:00Z", Some(60)),
            record(1, 11, "2026-02-03T12:30:00Z", Some(15)),
        ];
        let refs: Vec<&TimeRecord> = records.iter().collect();
        let daily = daily_totals(&refs, None);
        assert_eq!(daily.len(), 2);
        assert!(daily[0].date < daily[1].date);
        assert_eq!(daily[0].seconds, 75 * 60);
    }
}
