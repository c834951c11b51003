//! Study resources page

use axum::Json;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    pub title: &'static str,
    pub description: &'static str,
    pub link: &'static str,
}

pub static RESOURCES: [Resource; 3] = [
    Resource {
        title: "Preterm Study Brochure",
        description: "Download our study brochure with details about recruitment and protocol.",
        link: "/static/docs/preterm_brochure.pdf",
    },
    Resource {
        title: "Participant Guidelines",
        description: "Guidelines for participants and their families.",
        link: "/static/docs/participant_guidelines.pdf",
    },
    Resource {
        title: "AKU Partner Links",
        description: "Useful links to partner resources.",
        link: "https://www.aku.edu",
    },
];

/// GET /api/resources
pub async fn resources() -> Json<&'static [Resource]> {
    Json(&RESOURCES)
}
