//! Vinopedia reference data
//!
//! Static enology glossary and wine classification tables based on the
//! Venezuelan COVENIN 3342-97 standard. Text is kept in Spanish as the
//! record-keeping vocabulary of the cellar.

use serde::Serialize;

pub const VINOPEDIA_TITLE: &str = "Vinopedia (Basado en COVENIN 3342-97)";
pub const GLOSSARY_HEADING: &str = "Glosario del Enólogo";

const GLOSSARY_TERMS: &[(&str, &str)] = &[
    (
        "Vino",
        "Bebida resultante de la fermentación alcohólica (total o parcial) de la uva fresca o de sus mostos. Grado alcohólico entre 7° y 14° G.L.",
    ),
    (
        "Mosto",
        "Jugo de uva obtenido por medios físicos, que aún no ha fermentado o cuya fermentación ha sido detenida.",
    ),
    (
        "Acidez Total",
        "Medida de todos los ácidos presentes en el vino (tartárico, málico, cítrico, etc.). Mínimo 4.00 g/L (expresado en Ác. Tartárico).",
    ),
    (
        "Acidez Volátil",
        "Ácidos volátiles, principalmente ácido acético. Un exceso indica contaminación. Máximo 1.00 g/L para vinos de mesa y 1.20 g/L para vinos licorosos.",
    ),
    (
        "Anhídrido Sulfuroso (SO2)",
        "Conservante y antioxidante. Máximo total de 0.25 g/L.",
    ),
    (
        "Trasiego",
        "Transferir el vino de un recipiente a otro para separarlo de los sedimentos (lías), clarificándolo.",
    ),
    (
        "Lías",
        "Levaduras muertas y otros sólidos que se depositan en el fondo tras la fermentación.",
    ),
    (
        "Licor de Tiraje",
        "Mezcla de vino, azúcar y levaduras que se añade para iniciar la segunda fermentación en botella (vinos espumosos).",
    ),
    (
        "Licor de Expedición",
        "Dosis de vino y azúcar que se añade tras el degüelle para ajustar el dulzor final de un vino espumoso.",
    ),
];

const SUGAR_CLASSIFICATIONS: &[(&str, &str)] = &[
    ("Seco", "Hasta 5 g/L"),
    ("Semiseco o Abocado", "> 5 a 55 g/L"),
    ("Dulce o Generoso", "> 55 g/L"),
];

const SPARKLING_CLASSIFICATIONS: &[(&str, &str)] = &[
    ("Natural o Nature", "0 a 6 g/L"),
    ("Brut", "> 6 a 15 g/L"),
    ("Semiseco o Demi-Sec", "> 15 a 45 g/L"),
    ("Dulce", "> 45 g/L"),
];

const ALCOHOL_CLASSIFICATIONS: &[(&str, &str)] = &[
    ("Vino de Mesa", "7° a 14° G.L."),
    ("Vino Desalcoholizado", "Hasta 5° G.L."),
    ("Vino Soda", "3° a 5° G.L."),
    ("Vino Licoroso", "> 14° a 20° G.L."),
    ("Vino Compuesto", "> 14° a 20° G.L."),
    ("Destilado de Uva", "30° a 43° G.L."),
    ("Brandy", "40° a 50° G.L."),
];

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct GlossaryEntry {
    pub term: String,
    pub definition: String,
}

#[derive(Debug, Serialize)]
pub struct GlossaryResponse {
    pub title: String,
    pub heading: String,
    pub terms: Vec<GlossaryEntry>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct Classification {
    pub name: String,
    pub range: String,
}

#[derive(Debug, Serialize)]
pub struct ClassificationTable {
    pub title: String,
    pub entries: Vec<Classification>,
}

#[derive(Debug, Serialize)]
pub struct ClassificationsResponse {
    pub title: String,
    pub tables: Vec<ClassificationTable>,
}

// ============================================================================
// Tool Functions
// ============================================================================

/// Get the enologist glossary, optionally filtered by term
pub fn get_glossary(term: Option<&str>) -> GlossaryResponse {
    let needle = term.map(|t| t.trim().to_lowercase()).unwrap_or_default();

    let terms: Vec<GlossaryEntry> = GLOSSARY_TERMS
        .iter()
        .filter(|(name, _)| needle.is_empty() || name.to_lowercase().contains(&needle))
        .map(|(name, definition)| GlossaryEntry {
            term: name.to_string(),
            definition: definition.to_string(),
        })
        .collect();

    let total = terms.len();
    GlossaryResponse {
        title: VINOPEDIA_TITLE.to_string(),
        heading: GLOSSARY_HEADING.to_string(),
        terms,
        total,
    }
}

/// Get the COVENIN wine classification tables
pub fn wine_classifications() -> ClassificationsResponse {
    let table = |title: &str, data: &[(&str, &str)]| ClassificationTable {
        title: title.to_string(),
        entries: data
            .iter()
            .map(|(name, range)| Classification {
                name: name.to_string(),
                range: range.to_string(),
            })
            .collect(),
    };

    ClassificationsResponse {
        title: VINOPEDIA_TITLE.to_string(),
        tables: vec![
            table("Clasificación por Azúcar", SUGAR_CLASSIFICATIONS),
            table(
                "Clasificación por Azúcar (Espumosos)",
                SPARKLING_CLASSIFICATIONS,
            ),
            table("Clasificación por Grado Alcohólico", ALCOHOL_CLASSIFICATIONS),
        ],
    }
}
