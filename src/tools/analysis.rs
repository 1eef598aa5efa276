//! Analysis MCP Tools
//!
//! AI-assisted tasting reports: prompt assembly, backend call, and
//! sectioning of the returned text.

use serde::Serialize;

use crate::db::Database;
use crate::models::{Batch, IngredientUsage, LogEntry};
use crate::report::{
    build_analysis_prompt, contact_failure_text, sectionize_report, ReportBackend, ReportSection,
};

/// A sectioned tasting report for a batch
#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub batch_id: i64,
    pub batch_name: String,
    pub raw_report: String,
    pub sections: Vec<ReportSection>,
}

/// Response for sectionize_report
#[derive(Debug, Serialize)]
pub struct SectionizedReport {
    pub sections: Vec<ReportSection>,
}

/// Generate and section a tasting report for a batch.
///
/// Backend failures do not fail the tool: the failure message becomes the
/// raw report, which sections to placeholders.
pub async fn analyze_batch(
    db: &Database,
    backend: &dyn ReportBackend,
    batch_id: i64,
) -> Result<Option<AnalysisReport>, String> {
    // Pooled connections are not held across the backend await.
    let snapshot = {
        let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

        let batch = Batch::get_by_id(&conn, batch_id)
            .map_err(|e| format!("Failed to get batch: {}", e))?;

        match batch {
            Some(batch) => {
                let ingredients = IngredientUsage::get_for_batch(&conn, batch_id)
                    .map_err(|e| format!("Failed to get ingredients: {}", e))?;
                let latest = LogEntry::latest_for_batch(&conn, batch_id)
                    .map_err(|e| format!("Failed to get latest log entry: {}", e))?;
                Some((batch, ingredients, latest))
            }
            None => None,
        }
    };

    let (batch, ingredients, latest) = match snapshot {
        Some(parts) => parts,
        None => return Ok(None),
    };

    let prompt = build_analysis_prompt(&batch, &ingredients, latest.as_ref());

    let raw_report = match backend.generate(&prompt).await {
        Ok(text) => text,
        Err(detail) => contact_failure_text(&detail),
    };

    let sections = sectionize_report(&raw_report);

    Ok(Some(AnalysisReport {
        batch_id: batch.id,
        batch_name: batch.name,
        raw_report,
        sections: sections.to_vec(),
    }))
}

/// Section an arbitrary report text without touching the database
pub fn sectionize_text(raw_report: &str) -> SectionizedReport {
    SectionizedReport {
        sections: sectionize_report(raw_report).to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Adjustments, BatchCreate, MustComposition};
    use crate::report::{SectionKey, NO_CONTENT_PLACEHOLDER};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedBackend {
        reply: Result<String, String>,
        seen_prompt: Mutex<Option<String>>,
    }

    impl CannedBackend {
        fn new(reply: Result<String, String>) -> Self {
            Self {
                reply,
                seen_prompt: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl ReportBackend for CannedBackend {
        async fn generate(&self, prompt: &str) -> Result<String, String> {
            *self.seen_prompt.lock().unwrap() = Some(prompt.to_string());
            self.reply.clone()
        }
    }

    fn test_db(name: &str) -> Database {
        let db = Database::new(format!("file:{}?mode=memory&cache=shared", name)).unwrap();
        let conn = db.get_conn().unwrap();
        crate::db::migrations::run_migrations(&conn).unwrap();
        db
    }

    fn seed_batch(db: &Database) -> i64 {
        let conn = db.get_conn().unwrap();
        let batch = Batch::create(
            &conn,
            &BatchCreate {
                name: "Merlot Experimental 2025".to_string(),
                creation_date: Some("2025-07-01".to_string()),
                yeast: "EC-1118".to_string(),
                must: MustComposition::default(),
                adjustments: Adjustments {
                    added_sugar_kg: "1".to_string(),
                    initial_sg: "1.090".to_string(),
                    initial_brix: "21.8".to_string(),
                    initial_temp_c: "22".to_string(),
                },
                status: None,
            },
        )
        .unwrap();
        batch.id
    }

    #[tokio::test]
    async fn test_analyze_sections_backend_reply() {
        let db = test_db("analysis_ok");
        let id = seed_batch(&db);
        let backend = CannedBackend::new(Ok(
            "**Análisis del Estado Actual:**\nFermentación vigorosa.\n\
             **Próximos Pasos:**\nMedir densidad mañana."
                .to_string(),
        ));

        let report = analyze_batch(&db, &backend, id).await.unwrap().unwrap();

        assert_eq!(report.batch_name, "Merlot Experimental 2025");
        assert_eq!(report.sections[0].key, SectionKey::Status);
        assert_eq!(report.sections[0].content, "Fermentación vigorosa.");
        assert_eq!(report.sections[2].content, "Medir densidad mañana.");
        assert_eq!(report.sections[1].content, NO_CONTENT_PLACEHOLDER);

        let prompt = backend.seen_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("- Nombre: Merlot Experimental 2025"));
        assert!(prompt.contains("SG: 1.09, Temp: 22°C"));
    }

    #[tokio::test]
    async fn test_backend_failure_becomes_placeholder_report() {
        let db = test_db("analysis_err");
        let id = seed_batch(&db);
        let backend = CannedBackend::new(Err("network timeout".to_string()));

        let report = analyze_batch(&db, &backend, id).await.unwrap().unwrap();

        assert_eq!(report.raw_report, "Error al contactar la IA: network timeout.");
        for section in &report.sections {
            assert_eq!(section.content, NO_CONTENT_PLACEHOLDER);
        }
    }

    #[tokio::test]
    async fn test_analyze_missing_batch() {
        let db = test_db("analysis_missing");
        let backend = CannedBackend::new(Ok(String::new()));
        assert!(analyze_batch(&db, &backend, 99).await.unwrap().is_none());
    }

    #[test]
    fn test_sectionize_text_is_stateless() {
        let report = sectionize_text("**Consejo del Enólogo:**\nPaciencia.");
        assert_eq!(report.sections[3].content, "Paciencia.");
        assert_eq!(report.sections[0].content, NO_CONTENT_PLACEHOLDER);
    }
}
