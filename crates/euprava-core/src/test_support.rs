//! Fixtures shared by unit tests.

use crate::RecordId;
use crate::border::{Crossing, CriminalReport};
use chrono::Utc;

pub fn crossing(id: u64, jmbg: &str) -> Crossing {
    Crossing {
        id: RecordId(id),
        crossed_at: Utc::now(),
        traveller_first_name: "Petar".into(),
        traveller_last_name: "Petrovic".into(),
        traveller_jmbg: jmbg.into(),
        traveller_card_number: "012345678".into(),
        traveller_passport_number: "987654321".into(),
        traveller_citizenship: "Srbija".into(),
        vehicle_make: String::new(),
        vehicle_model: String::new(),
        purpose: String::new(),
        approved: true,
    }
}

pub fn criminal_report(id: u64) -> CriminalReport {
    criminal_report_for(id, "1234567890123")
}

pub fn criminal_report_for(id: u64, jmbg: &str) -> CriminalReport {
    CriminalReport {
        id: RecordId(id),
        filed_at: Utc::now(),
        description: "smuggling".into(),
        crossing: crossing(id, jmbg),
    }
}
