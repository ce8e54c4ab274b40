use std::collections::HashMap;

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::MEMBER_REVENUE_INFO;
use crate::model::{Member, Order};
use crate::pipeline::{aggregate, AggregateMode, MetricInput, ToTables};
use crate::table::{Cell, Kind, Table};

/// One labeled age range; `max_age` is inclusive and `None` leaves the range open.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AgeGroup {
    pub max_age: Option<i64>,
    pub label: String,
}

/// Age ranges in ascending order, starting at age 0.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AgeGroups(pub Vec<AgeGroup>);

impl Default for AgeGroups {
    fn default() -> Self {
        // ages past 150 are treated as bad data and get no group
        let bounded = [
            (15, "<16"),
            (25, "16-25"),
            (35, "26-35"),
            (45, "36-45"),
            (55, "46-55"),
            (65, "56-65"),
            (150, ">65"),
        ];
        AgeGroups(
            bounded
                .into_iter()
                .map(|(max_age, label)| AgeGroup {
                    max_age: Some(max_age),
                    label: label.to_string(),
                })
                .collect(),
        )
    }
}

impl AgeGroups {
    pub fn label(&self, age: i64) -> Option<&str> {
        if age < 0 {
            return None;
        }
        self.0
            .iter()
            .find(|group| group.max_age.map_or(true, |max_age| age <= max_age))
            .map(|group| group.label.as_str())
    }
}

/// Whole years between two dates, rounded to the nearest year of 365 days.
pub fn age_at(birth_date: NaiveDate, on: NaiveDate) -> i64 {
    ((on - birth_date).num_days() as f64 / 365.0).round() as i64
}

fn default_new_member_days() -> i64 {
    30
}

/// Member-order revenue broken down by the buyer's gender, age group and tenure at order time.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MemberRevenueInfo {
    /// Orders placed at most this many days after registration count as from a new member.
    #[serde(default = "default_new_member_days")]
    pub new_member_days: i64,
    #[serde(default)]
    pub age_groups: AgeGroups,
}

impl Default for MemberRevenueInfo {
    fn default() -> Self {
        MemberRevenueInfo {
            new_member_days: default_new_member_days(),
            age_groups: AgeGroups::default(),
        }
    }
}

impl ToTables for MemberRevenueInfo {
    fn to_tables(&self, input: &MetricInput<'_>) -> Result<Vec<Table>> {
        Ok(vec![self.member_revenue_info(
            input.snapshot.member_orders(),
            &input.snapshot.members,
        )])
    }
}

impl MemberRevenueInfo {
    pub fn member_revenue_info(&self, orders: &[Order], members: &[Member]) -> Table {
        let profiles: HashMap<&str, &Member> =
            members.iter().map(|m| (m.member_id.as_str(), m)).collect();

        let groups = aggregate(orders.iter().map(|order| {
            let member_id = order.member_id.as_deref();
            let profile = member_id.and_then(|id| profiles.get(id));
            let gender = profile.and_then(|m| m.gender.as_deref());
            let age_group = profile
                .and_then(|m| m.birth_date)
                .and_then(|birth_date| self.age_groups.label(age_at(birth_date, order.date)));
            let is_new_member = profile
                .and_then(|m| m.register_date)
                .map_or(false, |registered| {
                    (order.date - registered).num_days() <= self.new_member_days
                });
            (
                (order.date, order.is_online(), member_id, gender, age_group, is_new_member),
                order,
            )
        }));

        let mode = AggregateMode::Full;
        let mut columns = vec![
            ("date", Kind::Date),
            ("is_online", Kind::Bool),
            ("member_id", Kind::Text),
            ("gender", Kind::Text),
            ("age_group", Kind::Text),
            ("is_new_member", Kind::Bool),
        ];
        columns.extend(mode.columns());
        let mut table = Table::new(MEMBER_REVENUE_INFO, columns);
        for ((date, is_online, member_id, gender, age_group, is_new_member), totals) in groups {
            let mut row = vec![
                Cell::from(date),
                is_online.into(),
                member_id.into(),
                gender.into(),
                age_group.into(),
                is_new_member.into(),
            ];
            row.extend(totals.cells(mode));
            table.push(row);
        }
        table
    }
}
