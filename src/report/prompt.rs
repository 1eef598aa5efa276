//! Analysis prompt construction
//!
//! Builds the Spanish enologist prompt sent to the generative endpoint.
//! The required headings here are what the sectionizer keys on, so the
//! two sides stay in lockstep.

use crate::models::{Batch, IngredientUsage, LogEntry};

/// Format an optional reading for the prompt, "N/A" when absent.
fn format_reading(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "N/A".to_string(),
    }
}

/// Build the analysis prompt for a batch snapshot.
///
/// The latest log entry is the last one in date order; batches whose log
/// is empty get "N/A" readings instead of failing.
pub fn build_analysis_prompt(
    batch: &Batch,
    ingredients: &[IngredientUsage],
    latest_entry: Option<&LogEntry>,
) -> String {
    let ingredient_names = ingredients
        .iter()
        .map(|i| i.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let (latest_sg, latest_temp) = match latest_entry {
        Some(entry) => (format_reading(entry.sg), format_reading(entry.temp_c)),
        None => ("N/A".to_string(), "N/A".to_string()),
    };

    format!(
        "Eres un enólogo experto y asistente de IA. Tu tono es amigable y educativo.\n\
         Analiza el siguiente lote de vino y proporciona un informe conciso y moderno en secciones claras.\n\
         \n\
         **Formato de Respuesta Requerido:**\n\
         **Análisis del Estado Actual:** Breve resumen del progreso. ¿Va bien? ¿Hay alertas?\n\
         **Notas de Cata Sugeridas:** Describe el perfil de aroma y sabor esperado (frutas, especias, notas terrosas, etc.) y la posible sensación en boca (cuerpo, acidez, taninos) basado en los ingredientes.\n\
         **Próximos Pasos:** Recomendación clara y directa.\n\
         **Consejo del Enólogo:** Un consejo educativo o un dato interesante relacionado con el estado o los ingredientes del lote.\n\
         \n\
         **Datos del Lote:**\n\
         - Nombre: {}\n\
         - Estado: {}\n\
         - Registro de Fermentación más reciente: SG: {}, Temp: {}°C\n\
         - Ingredientes: {}.",
        batch.name,
        batch.status.display_name(),
        latest_sg,
        latest_temp,
        ingredient_names,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Adjustments, BatchStatus, MustComposition};

    fn sample_batch() -> Batch {
        Batch {
            id: 1,
            name: "Merlot Experimental 2025".to_string(),
            creation_date: "2025-07-01".to_string(),
            yeast: "EC-1118".to_string(),
            must: MustComposition::default(),
            adjustments: Adjustments::default(),
            status: BatchStatus::Fermenting,
            created_at: "2025-07-01 00:00:00".to_string(),
            updated_at: "2025-07-01 00:00:00".to_string(),
        }
    }

    fn sample_entry() -> LogEntry {
        LogEntry {
            id: 9,
            batch_id: 1,
            date: "2025-07-05".to_string(),
            sg: Some(1.050),
            brix: Some(12.8),
            temp_c: Some(25.0),
            notes: None,
            created_at: "2025-07-05 00:00:00".to_string(),
            updated_at: "2025-07-05 00:00:00".to_string(),
        }
    }

    fn sample_ingredient(name: &str) -> IngredientUsage {
        IngredientUsage {
            id: 1,
            batch_id: 1,
            position: 0,
            name: name.to_string(),
            quantity: "5".to_string(),
            unit: "g".to_string(),
            created_at: "2025-07-01 00:00:00".to_string(),
            updated_at: "2025-07-01 00:00:00".to_string(),
        }
    }

    #[test]
    fn test_prompt_demands_the_four_headings() {
        let prompt = build_analysis_prompt(&sample_batch(), &[], None);
        assert!(prompt.contains("**Análisis del Estado Actual:**"));
        assert!(prompt.contains("**Notas de Cata Sugeridas:**"));
        assert!(prompt.contains("**Próximos Pasos:**"));
        assert!(prompt.contains("**Consejo del Enólogo:**"));
    }

    #[test]
    fn test_prompt_embeds_batch_data() {
        let ingredients = vec![
            sample_ingredient("Nutriente (Fermaid K)"),
            sample_ingredient("Azúcar Refinada"),
        ];
        let entry = sample_entry();
        let prompt = build_analysis_prompt(&sample_batch(), &ingredients, Some(&entry));

        assert!(prompt.contains("- Nombre: Merlot Experimental 2025"));
        assert!(prompt.contains("- Estado: En Fermentación"));
        assert!(prompt.contains("SG: 1.05, Temp: 25°C"));
        assert!(prompt.contains("- Ingredientes: Nutriente (Fermaid K), Azúcar Refinada."));
    }

    #[test]
    fn test_prompt_without_log_uses_na_readings() {
        let prompt = build_analysis_prompt(&sample_batch(), &[], None);
        assert!(prompt.contains("SG: N/A, Temp: N/A°C"));
    }
}
