use std::sync::Arc;

use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};

use crate::aggregator::{AggregatedResult, Aggregator};
use crate::config::Settings;
use crate::sources::FeedItem;

pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub settings: Settings,
}

// Template structs
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub sections: Vec<Section>,
    pub fetched_at: String,
    pub notices: Vec<String>,
    pub refreshing: bool,
}

pub struct Section {
    pub heading: &'static str,
    pub cards: Vec<Card>,
}

pub struct Card {
    pub headline: String,
    /// Untranslated title, empty when it would just repeat the headline
    pub original: String,
    pub link: String,
    pub summary: String,
    pub published: String,
}

impl From<&FeedItem> for Card {
    fn from(item: &FeedItem) -> Self {
        let translated = item
            .title_translated
            .as_deref()
            .filter(|t| !t.is_empty() && *t != item.title);

        Self {
            headline: translated.unwrap_or(item.title.as_str()).to_string(),
            original: if translated.is_some() {
                item.title.clone()
            } else {
                String::new()
            },
            link: if item.link.is_empty() {
                "#".to_string()
            } else {
                item.link.clone()
            },
            summary: plain_text(&item.summary),
            published: item.published.clone(),
        }
    }
}

/// Visible text of an HTML fragment, whitespace collapsed. Search-feed
/// descriptions are markup (`<a href=..>title</a>&nbsp;<font>source</font>`).
fn plain_text(fragment: &str) -> String {
    let text: String = scraper::Html::parse_fragment(fragment)
        .root_element()
        .text()
        .collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl IndexTemplate {
    pub fn from_result(result: &AggregatedResult, refreshing: bool) -> Self {
        let section = |heading, items: &[FeedItem]| Section {
            heading,
            cards: items.iter().map(Card::from).collect(),
        };

        Self {
            sections: vec![
                section("Musk", &result.musk),
                section("Reuters", &result.reuters),
                section("Bloomberg", &result.bloomberg),
            ],
            fetched_at: result.fetched_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            notices: result.notices.clone(),
            refreshing,
        }
    }
}

#[derive(Template)]
#[template(path = "refresh_button.html")]
pub struct RefreshButtonTemplate {
    pub refreshing: bool,
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

// Route handlers
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let result = state.aggregator.latest_or_refresh(&state.settings).await;
    let refreshing = state.aggregator.is_refreshing().await;

    HtmlTemplate(IndexTemplate::from_result(&result, refreshing))
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let aggregator = state.aggregator.clone();
    let settings = state.settings.clone();
    tokio::spawn(async move {
        let _ = aggregator.refresh(&settings).await;
    });

    HtmlTemplate(RefreshButtonTemplate { refreshing: true })
}

pub async fn refresh_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let refreshing = state.aggregator.is_refreshing().await;
    HtmlTemplate(RefreshButtonTemplate { refreshing })
}

pub async fn items(State(state): State<Arc<AppState>>) -> Json<AggregatedResult> {
    let result = state
        .aggregator
        .latest()
        .await
        .map(|r| (*r).clone())
        .unwrap_or_else(AggregatedResult::empty);
    Json(result)
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourcesConfig;
    use crate::sources::Source;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::{get, post},
        Router,
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn create_test_app() -> (Router, Arc<Aggregator>) {
        let sources = SourcesConfig {
            search_url: "http://127.0.0.1:1/rss/search".to_string(),
            musk_mirrors: vec!["http://127.0.0.1:1/mirror".to_string()],
            ..Default::default()
        };
        let aggregator = Arc::new(Aggregator::new(&sources, None));
        let state = Arc::new(AppState {
            aggregator: aggregator.clone(),
            settings: Settings {
                use_proxy: false,
                proxy: String::new(),
                limit: 5,
            },
        });

        let app = Router::new()
            .route("/", get(index))
            .route("/refresh", post(refresh))
            .route("/refresh/status", get(refresh_status))
            .route("/api/items", get(items))
            .route("/health", get(health))
            .with_state(state);

        (app, aggregator)
    }

    fn sample_result() -> AggregatedResult {
        let mut result = AggregatedResult::empty();
        result.reuters.push(FeedItem {
            summary: "Stocks rose".to_string(),
            published: "Mon, 09 Dec 2024 12:00:00 +0000".to_string(),
            title_translated: Some("市场上涨".to_string()),
            ..FeedItem::new(Source::Reuters, "Markets rally", "https://r.example/1")
        });
        result.musk.push(FeedItem {
            title_translated: Some("Launch".to_string()),
            ..FeedItem::new(Source::Musk, "Launch", "")
        });
        result.notices.push("[Bloomberg] boom".to_string());
        result
    }

    async fn body_string(response: Response) -> String {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(body.to_vec()).unwrap()
    }

    mod health_tests {
        use super::*;

        #[tokio::test]
        async fn test_health_endpoint() {
            let (app, _aggregator) = create_test_app();

            let response = app
                .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_string(response).await, "OK");
        }
    }

    mod index_tests {
        use super::*;

        #[tokio::test]
        async fn test_index_with_all_sources_down() {
            let (app, _aggregator) = create_test_app();

            let response = app
                .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert!(body_string(response).await.contains("TrendTool"));
        }

        #[tokio::test]
        async fn test_index_renders_cached_cards() {
            let (app, aggregator) = create_test_app();
            aggregator.publish(sample_result()).await;

            let response = app
                .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
                .await
                .unwrap();

            let body = body_string(response).await;
            assert!(body.contains("市场上涨"));
            assert!(body.contains("Markets rally"));
            assert!(body.contains("Stocks rose"));
            assert!(body.contains("r.example"));
            assert!(body.contains("[Bloomberg] boom"));
        }
    }

    mod card_tests {
        use super::*;

        #[test]
        fn test_card_hides_identical_original() {
            let result = sample_result();
            let card = Card::from(&result.musk[0]);

            assert_eq!(card.headline, "Launch");
            assert_eq!(card.original, "");
            assert_eq!(card.link, "#");
        }

        #[test]
        fn test_card_shows_original_under_translation() {
            let result = sample_result();
            let card = Card::from(&result.reuters[0]);

            assert_eq!(card.headline, "市场上涨");
            assert_eq!(card.original, "Markets rally");
        }

        #[test]
        fn test_card_summary_drops_markup() {
            let mut item = FeedItem::new(Source::Reuters, "Fed holds", "https://r.example");
            item.summary = r##"<a href="https://r.example/1" target="_blank">Fed holds rates</a>&nbsp;&nbsp;<font color="#6f6f6f">Reuters</font>"##.to_string();

            let card = Card::from(&item);
            assert_eq!(card.summary, "Fed holds rates Reuters");
        }

        #[test]
        fn test_card_plain_summary_is_kept() {
            let mut item = FeedItem::new(Source::Musk, "Post", "");
            item.summary = "  Stocks   rose & fell ".to_string();

            assert_eq!(Card::from(&item).summary, "Stocks rose & fell");
        }

        #[test]
        fn test_untranslated_item() {
            let item = FeedItem::new(Source::Bloomberg, "Plain", "https://b.example");
            let card = Card::from(&item);
            assert_eq!(card.headline, "Plain");
            assert_eq!(card.original, "");
        }
    }

    mod refresh_tests {
        use super::*;

        #[tokio::test]
        async fn test_refresh_endpoint() {
            let (app, _aggregator) = create_test_app();

            let response = app
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/refresh")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert!(body_string(response).await.contains("Refreshing"));
        }

        #[tokio::test]
        async fn test_refresh_status_endpoint() {
            let (app, _aggregator) = create_test_app();

            let response = app
                .oneshot(
                    Request::builder()
                        .uri("/refresh/status")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert!(body_string(response).await.contains("Refresh"));
        }
    }

    mod api_tests {
        use super::*;

        #[tokio::test]
        async fn test_items_json() {
            let (app, aggregator) = create_test_app();
            aggregator.publish(sample_result()).await;

            let response = app
                .oneshot(Request::builder().uri("/api/items").body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            let json: serde_json::Value =
                serde_json::from_str(&body_string(response).await).unwrap();
            assert_eq!(json["reuters"][0]["title"], "Markets rally");
            assert_eq!(json["reuters"][0]["source"], "reuters");
            assert_eq!(json["bloomberg"].as_array().unwrap().len(), 0);
        }
    }
}
