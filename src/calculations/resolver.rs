use crate::calendar::WorkCalendar;
use crate::entry::{EntryId, ProgrammeEntry, Relationship};
use crate::graph::ReferenceIssue;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A predecessor reference the pass could not honour. The entry was dated by
/// chaining off the previous entry instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InconsistentReference {
    pub entry_id: EntryId,
    pub sequence_order: i32,
    pub predecessor_sequence_order: i32,
    pub issue: ReferenceIssue,
    /// The dangling reference was removed during renumbering.
    pub cleared: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Entries sorted and renumbered 0..n with estimated dates attached.
    pub entries: Vec<ProgrammeEntry>,
    pub inconsistencies: Vec<InconsistentReference>,
    /// Entries whose dates, position or predecessor differ from the input.
    pub changed: usize,
}

/// Single forward pass over an owner's entries in sequence order.
pub struct Resolver<'a> {
    calendar: &'a WorkCalendar,
}

impl<'a> Resolver<'a> {
    pub fn new(calendar: &'a WorkCalendar) -> Self {
        Self { calendar }
    }

    pub fn resolve(&self, mut entries: Vec<ProgrammeEntry>, base_start: NaiveDate) -> Resolution {
        entries.sort_by_key(|entry| entry.sequence_order);
        let originals = entries.clone();

        let positions: HashMap<i32, i32> = entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (entry.sequence_order, idx as i32))
            .collect();

        // Keyed by the input sequence order so predecessors resolve by the
        // numbering the references were written against.
        let mut resolved: HashMap<i32, (NaiveDate, NaiveDate)> = HashMap::with_capacity(entries.len());
        let mut previous_end: Option<NaiveDate> = None;
        let mut inconsistencies = Vec::new();

        for (idx, entry) in entries.iter_mut().enumerate() {
            let start = match (entry.manual_start_date, entry.predecessor_sequence_order) {
                (Some(manual), _) => self.calendar.ensure_working_day(manual),
                (None, Some(predecessor)) => match resolved.get(&predecessor) {
                    Some(&(pred_start, pred_end)) => {
                        let relationship = entry.effective_relationship().unwrap_or_default();
                        self.start_from_predecessor(relationship, pred_start, pred_end, entry.cycle_days)
                    }
                    None => {
                        let issue = if predecessor == entry.sequence_order {
                            ReferenceIssue::SelfReference
                        } else if positions.contains_key(&predecessor) {
                            ReferenceIssue::Forward
                        } else {
                            ReferenceIssue::Missing
                        };
                        tracing::warn!(
                            entry = %entry.id,
                            sequence_order = entry.sequence_order,
                            predecessor,
                            %issue,
                            "predecessor not resolved; chaining off previous entry"
                        );
                        inconsistencies.push(InconsistentReference {
                            entry_id: entry.id,
                            sequence_order: entry.sequence_order,
                            predecessor_sequence_order: predecessor,
                            issue,
                            cleared: issue == ReferenceIssue::Missing,
                        });
                        self.chain_start(previous_end, base_start)
                    }
                },
                (None, None) => self.chain_start(previous_end, base_start),
            };

            let end = self.end_for(entry, start);

            resolved.insert(entry.sequence_order, (start, end));
            previous_end = Some(end);

            entry.estimated_start_date = Some(start);
            entry.estimated_end_date = Some(end);
            entry.sequence_order = idx as i32;
            match entry.predecessor_sequence_order {
                Some(predecessor) => match positions.get(&predecessor) {
                    Some(&position) => {
                        entry.predecessor_sequence_order = Some(position);
                        entry.relationship = Some(entry.relationship.unwrap_or_default());
                    }
                    None => entry.clear_predecessor(),
                },
                None => entry.relationship = None,
            }
        }

        let changed = entries
            .iter()
            .zip(originals.iter())
            .filter(|(after, before)| after != before)
            .count();

        tracing::debug!(
            entries = entries.len(),
            changed,
            fallbacks = inconsistencies.len(),
            "forward pass complete"
        );

        Resolution {
            entries,
            inconsistencies,
            changed,
        }
    }

    fn chain_start(&self, previous_end: Option<NaiveDate>, base_start: NaiveDate) -> NaiveDate {
        match previous_end {
            Some(end) => self.calendar.next_working_day(end),
            None => self.calendar.ensure_working_day(base_start),
        }
    }

    fn start_from_predecessor(
        &self,
        relationship: Relationship,
        pred_start: NaiveDate,
        pred_end: NaiveDate,
        cycle_days: u32,
    ) -> NaiveDate {
        let span = cycle_days.saturating_sub(1);
        let start = match relationship {
            Relationship::FS => self.calendar.next_working_day(pred_end),
            Relationship::SS => pred_start,
            Relationship::FF => self.calendar.subtract_working_days(pred_end, span),
            Relationship::SF => self.calendar.subtract_working_days(pred_start, span),
        };
        self.calendar.ensure_working_day(start)
    }

    fn end_for(&self, entry: &ProgrammeEntry, start: NaiveDate) -> NaiveDate {
        match entry.manual_end_date {
            Some(manual) => {
                let end = self.calendar.ensure_working_day(manual);
                if end < start {
                    tracing::warn!(
                        entry = %entry.id,
                        %end,
                        %start,
                        "manual end precedes start; clamping to start"
                    );
                    start
                } else {
                    end
                }
            }
            None => self
                .calendar
                .add_working_days(start, entry.cycle_days.saturating_sub(1)),
        }
    }
}
