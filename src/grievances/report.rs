use time::UtcOffset;
use tracing::warn;

use super::{ai::SolutionClient, pdf, repo_types::Grievance};

pub const SOLUTION_PLACEHOLDER: &str = "Error generating AI solution";
pub const MISSING_DESCRIPTION: &str = "No description available";
const REPORT_TITLE: &str = "Grievance Report";

pub fn solution_prompt(description: &str) -> String {
    format!(
        "Analyze the problem and provide a detailed solution with highlighted points regarding \
         how to solve the problem from the perspective of a Government officer: {description}"
    )
}

/// Asks the AI service for a resolution; any failure becomes the placeholder.
/// Grievances without a description are not sent at all.
pub async fn draft_or_placeholder(ai: &dyn SolutionClient, description: Option<&str>) -> String {
    let Some(description) = description.filter(|d| !d.trim().is_empty()) else {
        return SOLUTION_PLACEHOLDER.to_string();
    };
    match ai.draft_solution(&solution_prompt(description)).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "AI solution unavailable, using placeholder");
            SOLUTION_PLACEHOLDER.to_string()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Report {
    pub grievance_code: String,
    pub rows: Vec<(&'static str, String)>,
}

impl Report {
    pub fn new(g: &Grievance, solution: String) -> Self {
        let description = g
            .description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(MISSING_DESCRIPTION)
            .to_string();
        let received = g.created_at.to_offset(UtcOffset::UTC).date();
        let rows = vec![
            ("Grievance Code", g.grievance_code.clone()),
            ("Complainant Name", g.complainant_name.clone()),
            ("Description", description),
            (
                "Date of Receipt",
                format!(
                    "{:04}-{:02}-{:02}",
                    received.year(),
                    u8::from(received.month()),
                    received.day()
                ),
            ),
            ("Complainant Email", g.complainant_email.clone()),
            ("AI Resolved", if g.ai_resolved { "Yes" } else { "No" }.to_string()),
            ("Current Status", g.current_status.clone()),
            ("AI Proposed Solution", solution),
        ];
        Self {
            grievance_code: g.grievance_code.clone(),
            rows,
        }
    }

    /// `Grievance_<code>.pdf`, with anything outside `[A-Za-z0-9_-]` replaced.
    pub fn filename(&self) -> String {
        let code: String = self
            .grievance_code
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("Grievance_{code}.pdf")
    }

    pub fn render_pdf(&self) -> anyhow::Result<Vec<u8>> {
        pdf::render_table(REPORT_TITLE, &self.rows)
    }
}

/// Builds a report for one grievance. Each call re-invokes the AI service.
pub async fn build_report(ai: &dyn SolutionClient, g: &Grievance) -> Report {
    let solution = draft_or_placeholder(ai, g.description.as_deref()).await;
    Report::new(g, solution)
}
