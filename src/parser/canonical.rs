use crate::model::overview::*;
use crate::model::{BasicCategory, SafetyBlock};

/// Labelled section text for an overview record, in page order.
///
/// Feeding the result back through the overview parser yields the same
/// populated fields. Safety values sourced from a tagged block are written as
/// a tagged block so the round trip keeps that provenance.
pub fn render_overview(record: &OverviewRecord) -> String {
    let mut out = Lines::default();

    // Identity
    let id = &record.identity;
    out.opt("Carrier Name: ", &id.name);
    out.opt("MC ", &id.mc_number);
    out.opt("DOT ", &id.dot_number);
    out.opt("SCAC ", &id.scac);

    if let Some(contact) = &record.dispatch_contact {
        out.push("Dispatch Contact");
        out.opt("", &contact.phone);
        out.opt("", &contact.email);
    }

    // Status
    if let Some(status) = record.authority_status {
        out.push(format!("DOT Status {}", status.as_str()));
    }
    out.opt("Operating Status: ", &record.operating_status);
    if let Some(rating) = record.safety_rating {
        out.push(format!("Safety Rating: {}", rating.as_str()));
    }

    for cert in &record.certifications {
        match &cert.date {
            Some(date) => out.push(format!("{} Certified {}", cert.name, date)),
            None => out.push(format!("{} Certified", cert.name)),
        }
    }

    // Equipment / network
    let eq = &record.equipment;
    out.num(eq.power_units, " Power Units");
    out.num(eq.trailers, " Trailers");
    if let Some(age) = eq.average_fleet_age_years {
        out.push(format!("Average Fleet Age {age} yrs old"));
    }
    out.num(record.network.served_states, " States");
    if let Some(cross) = record.network.cross_border {
        out.push(format!("Cross Border {}", if cross { "Yes" } else { "No" }));
    }

    render_authority(&mut out, &record.authority);

    // Operations
    out.opt("Fleet Size ", &record.operations.fleet_size);
    if !record.operations.cargo_carried.is_empty() {
        out.push(format!("Cargo Carried: {}", record.operations.cargo_carried.join(", ")));
    }

    if let Some(eld) = &record.eld {
        render_eld(&mut out, eld);
    }
    render_insurance(&mut out, &record.insurance);
    render_safety(&mut out, &record.safety);
    render_inspections(&mut out, &record.inspections);
    render_crashes(&mut out, &record.crashes);
    if let Some(risk) = &record.risk_score {
        render_risk(&mut out, risk);
    }

    let mut text = out.finish();
    if record.safety.source == Some(SafetySource::TaggedBlock) {
        let mut block = SafetyBlock::default();
        for category in BasicCategory::ALL {
            block.set(category, record.safety.get(category));
        }
        text.push_str(&block.encode());
    }
    text
}

#[derive(Default)]
struct Lines(Vec<String>);

impl Lines {
    fn push(&mut self, line: impl Into<String>) {
        self.0.push(line.into());
    }

    fn opt(&mut self, label: &str, value: &Option<String>) {
        if let Some(v) = value {
            self.push(format!("{label}{v}"));
        }
    }

    fn num(&mut self, value: Option<u32>, suffix: &str) {
        if let Some(n) = value {
            self.push(format!("{n}{suffix}"));
        }
    }

    fn finish(self) -> String {
        self.0.join("\n")
    }
}

fn render_authority(out: &mut Lines, authority: &Authority) {
    if !authority.types.is_empty() {
        out.push(format!("Authority Types: {}", authority.types.join(", ")));
    }
    if !authority.history.is_empty() {
        out.push("Authority History");
        for e in &authority.history {
            out.push(format!("{} {} {}", e.authority_type, e.action.as_str(), e.date));
        }
    }
    let rates = &authority.oos_rates;
    if rates.driver.is_some() || rates.vehicle.is_some() {
        out.push("Out of Service Rates");
        for (label, rate) in [("Driver", &rates.driver), ("Vehicle", &rates.vehicle)] {
            if let Some(r) = rate {
                out.push(format!(
                    "{} {} {} {}% {}%",
                    label, r.out_of_service, r.inspections, r.percentage, r.national_average
                ));
            }
        }
    }
}

fn render_eld(out: &mut Lines, eld: &EldConnection) {
    if let Some(status) = eld.status {
        out.push(format!("ELD Connection Status: {}", status.as_str()));
    }
    if let Some(assessment) = eld.assessment {
        out.push(format!("Assessment Status: {}", assessment.as_str()));
    }
    out.opt("ELD Provider: ", &eld.provider);
    out.opt("Connected on ", &eld.connected_date);
    if let Some(minutes) = eld.last_updated_minutes {
        out.push(format!("Updated {minutes} minutes ago"));
    }
}

fn render_insurance(out: &mut Lines, insurance: &Insurance) {
    let families = [
        ("General Liability", insurance.general_liability.as_ref().map(|p| &p.terms)),
        ("Auto Liability", insurance.auto.as_ref().map(|p| &p.terms)),
        ("Cargo", insurance.cargo.as_ref().map(|p| &p.terms)),
        ("Trailer Interchange", insurance.trailer_interchange.as_ref().map(|p| &p.terms)),
    ];
    if families.iter().all(|(_, terms)| terms.is_none()) {
        return;
    }

    out.push("Insurance");
    for (label, terms) in families {
        let Some(terms) = terms else { continue };
        out.push(format!("{} {}", label, if terms.active { "Active" } else { "Inactive" }));
        out.opt("Insurer Name: ", &terms.insurer);
        out.opt("Policy Number: ", &terms.policy_number);
        out.opt("Effective Date: ", &terms.effective_date);
        out.opt("Expiration Date: ", &terms.expiration_date);

        let money = |out: &mut Lines, label: &str, v: Option<u64>| {
            if let Some(v) = v {
                out.push(format!("{label}: ${v}"));
            }
        };
        match label {
            "General Liability" => {
                if let Some(gl) = &insurance.general_liability {
                    money(out, "Each Occurrence", gl.each_occurrence);
                    money(out, "General Aggregate", gl.general_aggregate);
                }
            }
            "Auto Liability" => money(out, "Limit", insurance.auto.as_ref().and_then(|p| p.limit)),
            "Cargo" => money(out, "Limit", insurance.cargo.as_ref().and_then(|p| p.limit)),
            _ => money(out, "Limit", insurance.trailer_interchange.as_ref().and_then(|p| p.limit)),
        }
    }
}

fn render_safety(out: &mut Lines, safety: &Safety) {
    let text_values = safety.source != Some(SafetySource::TaggedBlock);
    let any_category = BasicCategory::ALL.iter().any(|c| safety.get(*c).is_some());
    if !(text_values && any_category) && safety.total_violations.is_none() {
        return;
    }

    out.push("Safety");
    if text_values {
        for category in BasicCategory::ALL {
            let Some(measure) = safety.get(category) else { continue };
            out.push(category.label());
            if let Some(p) = measure.percentile {
                out.push(format!("CSA Percentile Equivalent: {p}%"));
            }
            if let Some(s) = measure.score {
                out.push(format!("BASIC Score: {s}"));
            }
        }
    }
    if let Some(total) = safety.total_violations {
        out.push(format!("Total Violations: {total}"));
    }
}

fn render_inspections(out: &mut Lines, inspections: &Inspections) {
    if inspections == &Inspections::default() {
        return;
    }
    out.push("Inspection History");
    out.num(inspections.count, " Inspections");
    out.opt("Inspection-to-Fleet Ratio: ", &inspections.ratio);
    if let Some(p) = inspections.percentile {
        out.push(format!("Top {p}% Percentile Ranking"));
    }
    for r in &inspections.history {
        out.push(format!(
            "{} {} {} {} {} {} {} {}",
            r.date, r.report_number, r.state, r.plate_number, r.plate_state, r.inspection_type, r.violations, r.out_of_service
        ));
    }
}

fn render_crashes(out: &mut Lines, crashes: &Crashes) {
    if crashes == &Crashes::default() {
        return;
    }
    out.push("Crash History");
    out.num(crashes.count_24_months, " Reported Crashes");
    for r in &crashes.history {
        out.push(format!(
            "{} {} {} {} {} {} {} {}",
            r.date, r.report_number, r.vin, r.location_state, r.plate_state, r.plate_number, r.fatalities, r.injuries
        ));
    }
}

fn render_risk(out: &mut Lines, risk: &RiskScore) {
    out.push("Bluewire Risk Score");
    if let Some(apps) = risk.composite {
        out.push(format!("APPS {apps}"));
    }
    let components = [
        ("Crashes", risk.crashes),
        ("Violations", risk.violations),
        ("CSA BASICs", risk.csa_basics),
        ("Driver OOS", risk.driver_oos),
        ("Critical Acute Violations", risk.critical_acute_violations),
        ("New Entrants", risk.new_entrants),
        ("MCS-150", risk.mcs150),
        ("Judicial Hellholes", risk.judicial_hellholes),
        ("Safety Rating", risk.safety_rating),
    ];
    for (label, value) in components {
        if let Some(v) = value {
            out.push(format!("{label}: {v} / 100"));
        }
    }
    out.opt("Updated at ", &risk.updated);
}

// ── Tests ──
