//! Chart reports rendered from the catalogue and its ratings.
//!
//! [`generate_all`] runs the ten reports in a fixed order. A report whose
//! aggregate is empty is skipped; the first failure aborts the rest.

pub mod charts;
pub mod density;
pub mod queries;

use std::path::{Path, PathBuf};

use biblioteca_db::Database;
use biblioteca_kernel::settings::ReportSettings;
use thiserror::Error;

use charts::{Labels, ValueFormat};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report query failed")]
    Database(#[from] sqlx::Error),

    #[error("cannot prepare output directory {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render {file}: {message}")]
    Render { file: &'static str, message: String },
}

pub type Result<T> = std::result::Result<T, ReportError>;

/// Outcome of a full run
#[derive(Debug, Default)]
pub struct ReportSummary {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<&'static str>,
}

/// Output file names, in generation order
pub const REPORT_FILES: [&str; 10] = [
    "1_libros_por_genero.png",
    "2_libros_por_autor.png",
    "3_promedio_calificacion_libro.png",
    "4_promedio_calificacion_genero.png",
    "5_calificaciones_por_usuario.png",
    "6_libros_mas_calificados.png",
    "7_autores_mas_calificados.png",
    "8_publicaciones_por_anio.png",
    "9_histograma_calificaciones.png",
    "10_promedio_usuario.png",
];

/// What a single report renders
enum Plot {
    Pie(queries::Series),
    HorizontalBars(queries::Series, ValueFormat),
    VerticalBars(queries::Series, ValueFormat),
    Area(Vec<(i64, f64)>),
    Density(Vec<f64>),
    Scatter(queries::Series),
}

impl Plot {
    fn is_empty(&self) -> bool {
        match self {
            Plot::Pie(data)
            | Plot::HorizontalBars(data, _)
            | Plot::VerticalBars(data, _)
            | Plot::Scatter(data) => data.is_empty(),
            Plot::Area(data) => data.is_empty(),
            Plot::Density(samples) => samples.is_empty(),
        }
    }

    fn render(&self, path: &Path, labels: Labels<'_>, text: bool) -> charts::DrawResult {
        match self {
            Plot::Pie(data) => charts::pie(path, labels.title, data, text),
            Plot::HorizontalBars(data, format) => {
                charts::horizontal_bars(path, labels, data, *format, text)
            }
            Plot::VerticalBars(data, format) => {
                charts::vertical_bars(path, labels, data, *format, text)
            }
            Plot::Area(data) => charts::area(path, labels, data, text),
            Plot::Density(samples) => {
                charts::density(path, labels, &density::gaussian_kde(samples), text)
            }
            Plot::Scatter(data) => charts::scatter(path, labels, data, text),
        }
    }
}

/// Render every report into `settings.output_dir`, overwriting older files
pub async fn generate_all(db: &Database, settings: &ReportSettings) -> Result<ReportSummary> {
    let output_dir = PathBuf::from(&settings.output_dir);
    std::fs::create_dir_all(&output_dir).map_err(|source| ReportError::Io {
        path: output_dir.clone(),
        source,
    })?;

    let text = charts::load_font(&settings.font_paths);
    let pool = db.pool();
    let mut summary = ReportSummary::default();

    for (index, file) in REPORT_FILES.into_iter().enumerate() {
        let (labels, plot) = match index {
            0 => (
                Labels {
                    title: "Distribución de Libros por Género",
                    x: "",
                    y: "",
                },
                Plot::Pie(queries::books_per_genre(pool).await?),
            ),
            1 => (
                Labels {
                    title: "Top 10 Autores con Más Libros",
                    x: "Cantidad de Libros",
                    y: "Autor",
                },
                Plot::HorizontalBars(queries::books_per_author(pool).await?, ValueFormat::Integer),
            ),
            2 => (
                Labels {
                    title: "Promedio de Calificación por Libro",
                    x: "Título",
                    y: "Promedio de Calificación",
                },
                Plot::VerticalBars(
                    queries::mean_rating_per_book(pool).await?,
                    ValueFormat::OneDecimal,
                ),
            ),
            3 => (
                Labels {
                    title: "Valoración Media según Género Literario",
                    x: "Promedio de Calificación",
                    y: "Género",
                },
                Plot::HorizontalBars(
                    queries::mean_rating_per_genre(pool).await?,
                    ValueFormat::OneDecimal,
                ),
            ),
            4 => (
                Labels {
                    title: "Cantidad de Calificaciones por Usuario",
                    x: "Usuario",
                    y: "Cantidad de Calificaciones",
                },
                Plot::VerticalBars(queries::ratings_per_user(pool).await?, ValueFormat::Integer),
            ),
            5 => (
                Labels {
                    title: "Libros con Más Calificaciones",
                    x: "Cantidad de Calificaciones",
                    y: "Título del Libro",
                },
                Plot::HorizontalBars(queries::most_rated_books(pool).await?, ValueFormat::Integer),
            ),
            6 => (
                Labels {
                    title: "Autores con Más Libros Calificados",
                    x: "Autor",
                    y: "Total de Calificaciones",
                },
                Plot::VerticalBars(queries::most_rated_authors(pool).await?, ValueFormat::Integer),
            ),
            7 => (
                Labels {
                    title: "Libros Publicados por Año",
                    x: "Año",
                    y: "Cantidad",
                },
                Plot::Area(queries::books_per_year(pool).await?),
            ),
            8 => (
                Labels {
                    title: "Distribución de Calificaciones",
                    x: "Calificación",
                    y: "Densidad",
                },
                Plot::Density(queries::rating_scores(pool).await?),
            ),
            _ => (
                Labels {
                    title: "Promedio de Calificación por Usuario",
                    x: "Usuario",
                    y: "Promedio",
                },
                Plot::Scatter(queries::mean_rating_per_user(pool).await?),
            ),
        };

        if plot.is_empty() {
            tracing::info!(report = file, "report skipped, no data");
            summary.skipped.push(file);
            continue;
        }

        let path = output_dir.join(file);
        plot.render(&path, labels, text)
            .map_err(|err| ReportError::Render {
                file,
                message: err.to_string(),
            })?;
        tracing::info!(report = file, path = %path.display(), "report written");
        summary.written.push(path);
    }

    tracing::info!(
        written = summary.written.len(),
        skipped = summary.skipped.len(),
        output_dir = %output_dir.display(),
        "reports generated"
    );
    Ok(summary)
}
