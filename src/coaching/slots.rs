use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;

use crate::models::{CoachAvailability, CoachingAppointment};

use super::lifecycle::AppointmentStatus;

pub const DAY_NAMES: [&str; 7] = [
    "Pazar",
    "Pazartesi",
    "Salı",
    "Çarşamba",
    "Perşembe",
    "Cuma",
    "Cumartesi",
];

/// Weekday index with Sunday as 0, the convention availability rows are stored in.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

pub fn day_name(day_of_week: u8) -> &'static str {
    DAY_NAMES.get(day_of_week as usize).copied().unwrap_or("")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppointmentSlot {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub day_of_week: u8,
    pub available: bool,
}

impl AppointmentSlot {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

/// A time range already claimed by an appointment.
#[derive(Debug, Clone, Copy)]
pub struct BookedInterval {
    pub start: NaiveDateTime,
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
}

impl BookedInterval {
    pub fn end(&self) -> NaiveDateTime {
        self.start
            .checked_add_signed(Duration::minutes(self.duration_minutes))
            .unwrap_or(NaiveDateTime::MAX)
    }

    /// Half-open overlap test: back-to-back ranges do not overlap.
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.start < end && start < self.end()
    }
}

impl From<&CoachingAppointment> for BookedInterval {
    fn from(appointment: &CoachingAppointment) -> Self {
        Self {
            start: appointment.appointment_date,
            duration_minutes: appointment.duration_minutes,
            status: appointment.status,
        }
    }
}

/// Days `[start_date, end_date)` to expand, cut into `slot_minutes` ticks.
#[derive(Debug, Clone, Copy)]
pub struct SlotWindow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub slot_minutes: i64,
}

impl SlotWindow {
    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days().max(0)
    }

    /// Datetime bounds covering every tick in the window.
    pub fn bounds(&self) -> (NaiveDateTime, NaiveDateTime) {
        (
            self.start_date.and_time(NaiveTime::MIN),
            self.end_date.and_time(NaiveTime::MIN),
        )
    }
}

/// Expand recurring weekly availability into concrete slots.
///
/// Every enabled availability row is expanded on its own, so rows that overlap
/// on the same weekday produce duplicate ticks. Those duplicates are kept; the
/// sort is stable and callers that want unique times must filter themselves.
pub fn generate_slots(
    availability: &[CoachAvailability],
    booked: &[BookedInterval],
    window: &SlotWindow,
) -> Vec<AppointmentSlot> {
    if window.slot_minutes <= 0 || availability.is_empty() {
        return Vec::new();
    }

    let step = Duration::minutes(window.slot_minutes);
    let mut slots = Vec::new();

    for date in window
        .start_date
        .iter_days()
        .take_while(|date| *date < window.end_date)
    {
        let weekday = day_of_week(date);

        for row in availability
            .iter()
            .filter(|row| row.is_available && row.day_of_week == weekday)
        {
            let mut tick = date.and_time(row.start_time);
            let row_end = date.and_time(row.end_time);

            while let Some(tick_end) = tick
                .checked_add_signed(step)
                .filter(|tick_end| *tick_end <= row_end)
            {
                let taken = booked
                    .iter()
                    .any(|b| b.status.occupies_slot() && b.overlaps(tick, tick_end));

                slots.push(AppointmentSlot {
                    date,
                    time: tick.time(),
                    day_of_week: weekday,
                    available: !taken,
                });

                tick = tick_end;
            }
        }
    }

    slots.sort_by_key(|slot| (slot.date, slot.time));
    slots
}

pub fn group_by_date(slots: &[AppointmentSlot]) -> BTreeMap<NaiveDate, Vec<AppointmentSlot>> {
    let mut grouped: BTreeMap<NaiveDate, Vec<AppointmentSlot>> = BTreeMap::new();
    for slot in slots {
        grouped.entry(slot.date).or_default().push(*slot);
    }
    grouped
}
