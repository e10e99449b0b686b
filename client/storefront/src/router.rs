//! Top-level views and what each one shows.

use std::convert::Infallible;
use std::str::FromStr;

use reqwest::Url;
use serde::Serialize;

use crate::catalog::{CatalogFilter, CatalogStore, CategorySummary, ProjectCard, ALL};
use crate::models::Project;

const FEATURED_COUNT: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Home,
    Projects,
    Categories,
    FreeProjects,
}

impl View {
    pub const ALL: [View; 4] = [
        View::Home,
        View::Projects,
        View::Categories,
        View::FreeProjects,
    ];

    /// Case-insensitive; unknown identifiers fall back to [`View::Home`].
    pub fn parse(id: &str) -> Self {
        match id.trim().to_ascii_lowercase().as_str() {
            "projects" => Self::Projects,
            "categories" => Self::Categories,
            "freeprojects" => Self::FreeProjects,
            _ => Self::Home,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Projects => "projects",
            Self::Categories => "categories",
            Self::FreeProjects => "freeprojects",
        }
    }

    /// Read the `view` parameter out of an address such as `/?view=projects`.
    /// The value is percent-decoded before matching.
    pub fn from_query(address: &str) -> Self {
        let address = if address.contains('?') {
            address.to_string()
        } else {
            format!("?{address}")
        };
        Url::parse("http://localhost/")
            .and_then(|base| base.join(&address))
            .ok()
            .and_then(|url| {
                url.query_pairs()
                    .find(|(key, _)| key == "view")
                    .map(|(_, value)| Self::parse(&value))
            })
            .unwrap_or_default()
    }

    /// Address that makes this view linkable.
    pub fn path(&self) -> String {
        match self {
            Self::Home => "/".to_string(),
            other => format!("/?view={}", other.as_str()),
        }
    }
}

impl FromStr for View {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Holds the current view.
#[derive(Debug, Clone, Default)]
pub struct Router {
    current: View,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore the view from a reloaded or shared address.
    pub fn from_address(address: &str) -> Self {
        Self {
            current: View::from_query(address),
        }
    }

    pub fn current(&self) -> View {
        self.current
    }

    /// Switch views, returning the address to mirror.
    pub fn navigate(&mut self, view: View) -> String {
        self.current = view;
        view.path()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum ViewContent {
    Home {
        featured: Vec<ProjectCard>,
        categories: Vec<CategorySummary>,
        total: usize,
        free: usize,
    },
    Projects {
        cards: Vec<ProjectCard>,
        page_count: u32,
    },
    Categories {
        categories: Vec<CategorySummary>,
        selected: Option<String>,
        cards: Vec<ProjectCard>,
    },
    #[serde(rename = "freeprojects")]
    FreeProjects { cards: Vec<ProjectCard> },
}

/// Build the content of `view` from the catalog.
pub fn render(
    view: View,
    catalog: &CatalogStore,
    filter: &CatalogFilter,
    currency_symbol: &str,
) -> ViewContent {
    let card = |p: &&Project| ProjectCard::new(p, currency_symbol);

    match view {
        View::Home => ViewContent::Home {
            featured: catalog
                .projects()
                .iter()
                .take(FEATURED_COUNT)
                .map(|p| ProjectCard::new(p, currency_symbol))
                .collect(),
            categories: catalog.categories(),
            total: catalog.projects().len(),
            free: catalog.free_projects(ALL).len(),
        },
        View::Projects => ViewContent::Projects {
            cards: catalog.filtered(filter).iter().map(card).collect(),
            page_count: catalog.page_count(),
        },
        View::Categories => {
            let selected = (filter.category != ALL).then(|| filter.category.clone());
            let cards: Vec<ProjectCard> = selected
                .as_deref()
                .map(|name| catalog.projects_in_category(name).iter().map(card).collect())
                .unwrap_or_default();
            ViewContent::Categories {
                categories: catalog.categories(),
                selected,
                cards,
            }
        }
        View::FreeProjects => ViewContent::FreeProjects {
            cards: catalog
                .free_projects(&filter.category)
                .iter()
                .map(card)
                .collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::testing::FakeBackend;

    #[test]
    fn known_identifiers_round_trip() {
        for view in View::ALL {
            assert_eq!(View::parse(view.as_str()), view);
        }
        assert_eq!(View::parse("checkout"), View::Home);
        assert_eq!("".parse::<View>().unwrap(), View::Home);
    }

    #[test]
    fn query_mirroring() {
        assert_eq!(View::from_query("/?view=categories"), View::Categories);
        assert_eq!(View::from_query("?ref=ad&view=freeprojects"), View::FreeProjects);
        assert_eq!(View::from_query("/?view=bogus"), View::Home);
        assert_eq!(View::from_query("/"), View::Home);
        assert_eq!(View::from_query("/?view=Projects"), View::Projects);
        assert_eq!(View::from_query("/?view=%66reeprojects"), View::FreeProjects);
        assert_eq!(View::from_query("/?view=+Categories+"), View::Categories);

        let mut router = Router::new();
        assert_eq!(router.navigate(View::Projects), "/?view=projects");
        assert_eq!(router.current(), View::Projects);
        assert_eq!(router.navigate(View::Home), "/");

        let restored = Router::from_address("/?view=projects");
        assert_eq!(restored.current(), View::Projects);
    }

    #[tokio::test]
    async fn each_view_renders_from_the_catalog() {
        let backend = FakeBackend::default();
        backend.push_catalog(Ok(serde_json::from_value(json!({
            "status": "success",
            "data": [
                { "id": 1, "title": "Blog", "price": 0, "category": "Web Development, PHP" },
                { "id": 2, "title": "Vision", "price": "4000", "category": "AI/ML" },
                { "id": 3, "title": "Notes", "price": 0, "category": "PHP" }
            ]
        }))
        .unwrap()));
        let mut catalog = CatalogStore::new(Arc::new(backend));
        catalog.fetch(None).await.unwrap();

        let default = CatalogFilter::default();
        match render(View::Home, &catalog, &default, "₹") {
            ViewContent::Home {
                featured,
                total,
                free,
                ..
            } => {
                assert_eq!(featured.len(), 3);
                assert_eq!(total, 3);
                assert_eq!(free, 2);
            }
            other => panic!("unexpected content: {other:?}"),
        }

        let php = CatalogFilter {
            category: "PHP".to_string(),
            ..CatalogFilter::default()
        };
        match render(View::Categories, &catalog, &php, "₹") {
            ViewContent::Categories {
                categories,
                selected,
                cards,
            } => {
                assert_eq!(categories[0].name, "PHP");
                assert_eq!(selected.as_deref(), Some("PHP"));
                assert_eq!(cards.len(), 2);
            }
            other => panic!("unexpected content: {other:?}"),
        }

        match render(View::FreeProjects, &catalog, &default, "₹") {
            ViewContent::FreeProjects { cards } => {
                assert!(cards.iter().all(|c| c.price == "FREE"));
                assert_eq!(cards.len(), 2);
            }
            other => panic!("unexpected content: {other:?}"),
        }

        match render(View::Projects, &catalog, &php, "₹") {
            ViewContent::Projects { cards, page_count } => {
                assert_eq!(cards.len(), 2);
                assert_eq!(page_count, 1);
            }
            other => panic!("unexpected content: {other:?}"),
        }
    }
}
