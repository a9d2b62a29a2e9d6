use axum::{
    Json,
    body::Bytes,
    extract::{RawQuery, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::sync::Arc;
use tracing::info;
use url::Url;

use super::{ApiError, ApiResponse, AppState, FeedCreatedDto, FeedParams};
use crate::clients::linkedin::job_view_url;
use crate::models::Offer;
use crate::services::FeedError;

const RSS_CONTENT_TYPE: &str = "application/rss+xml; charset=utf-8";

/// Reads `keywords` and `location` from the form body, then the query string.
/// Values are trimmed and lower-cased so that feeds differing only in case share
/// one query.
pub fn parse_feed_params(raw_query: Option<&str>, body: &[u8]) -> Result<FeedParams, ApiError> {
    let mut keywords = None;
    let mut location = None;

    let pairs = url::form_urlencoded::parse(body)
        .chain(url::form_urlencoded::parse(raw_query.unwrap_or_default().as_bytes()));

    for (key, value) in pairs {
        let value = value.trim().to_lowercase();
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            "keywords" if keywords.is_none() => keywords = Some(value),
            "location" if location.is_none() => location = Some(value),
            _ => {}
        }
    }

    match (keywords, location) {
        (Some(keywords), Some(location)) => Ok(FeedParams { keywords, location }),
        (keywords, location) => {
            let missing: Vec<&str> = [
                keywords.is_none().then_some("keywords"),
                location.is_none().then_some("location"),
            ]
            .into_iter()
            .flatten()
            .collect();
            Err(ApiError::validation(format!(
                "missing params: {}",
                missing.join(", ")
            )))
        }
    }
}

fn feed_url(state: &AppState, headers: &HeaderMap, params: &FeedParams) -> Result<Url, ApiError> {
    let base = state.config.server.public_url.clone().unwrap_or_else(|| {
        let host = headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("localhost");
        format!("https://{host}")
    });

    let mut url = Url::parse(&format!("{}/feeds", base.trim_end_matches('/')))
        .map_err(|e| ApiError::internal(format!("Invalid feed base URL {base}: {e}")))?;
    url.query_pairs_mut()
        .append_pair("keywords", &params.keywords)
        .append_pair("location", &params.location);

    Ok(url)
}

/// `POST /feeds`
pub async fn create_feed(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<FeedCreatedDto>>, ApiError> {
    let params = parse_feed_params(query.as_deref(), &body)?;

    state
        .feeds
        .create_query(&params.keywords, &params.location)
        .await?;

    let feed_url = feed_url(&state, &headers, &params)?;

    Ok(Json(ApiResponse::success(FeedCreatedDto {
        keywords: params.keywords,
        location: params.location,
        feed_url: feed_url.to_string(),
    })))
}

/// `GET /feeds`
pub async fn get_feed(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let params = parse_feed_params(query.as_deref(), &[])?;
    let feed_url = feed_url(&state, &headers, &params)?;

    let (status, offers) = match state
        .feeds
        .list_offers(&params.keywords, &params.location)
        .await
    {
        Ok(offers) => (StatusCode::OK, Some(offers)),
        Err(FeedError::NotFound(tag)) => {
            info!(tag = %tag, "Feed requested for unknown query");
            (StatusCode::NOT_FOUND, None)
        }
        Err(e) => return Err(e.into()),
    };

    let xml = render_feed(&params, feed_url.as_str(), offers.as_deref())?;

    Ok((status, [(header::CONTENT_TYPE, RSS_CONTENT_TYPE)], xml).into_response())
}

/// `{title} at {company} ({location}, posted Nov 13)`
#[must_use]
pub fn item_title(offer: &Offer) -> String {
    format!(
        "{} at {} ({}, posted {})",
        offer.title,
        offer.company,
        offer.location,
        offer.posted_at.format("%b %-d")
    )
}

fn text_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> anyhow::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_item<W: std::io::Write>(
    writer: &mut Writer<W>,
    title: &str,
    link: &str,
    guid: &str,
    pub_date: &str,
    description: &str,
) -> anyhow::Result<()> {
    writer.write_event(Event::Start(BytesStart::new("item")))?;
    text_element(writer, "title", title)?;
    text_element(writer, "link", link)?;
    writer.write_event(Event::Start(
        BytesStart::new("guid").with_attributes([("isPermaLink", "false")]),
    ))?;
    writer.write_event(Event::Text(BytesText::new(guid)))?;
    writer.write_event(Event::End(BytesEnd::new("guid")))?;
    text_element(writer, "pubDate", pub_date)?;
    text_element(writer, "description", description)?;
    writer.write_event(Event::End(BytesEnd::new("item")))?;
    Ok(())
}

/// RSS 2.0 document for a feed. `None` renders the single "feed not found" item.
pub fn render_feed(
    params: &FeedParams,
    feed_url: &str,
    offers: Option<&[Offer]>,
) -> anyhow::Result<String> {
    let now = Utc::now().to_rfc2822();
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(
        BytesStart::new("rss").with_attributes([("version", "2.0")]),
    ))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    text_element(
        &mut writer,
        "title",
        &format!("{} jobs in {}", params.keywords, params.location),
    )?;
    text_element(&mut writer, "link", feed_url)?;
    text_element(
        &mut writer,
        "description",
        &format!(
            "Job offers matching \"{}\" in \"{}\"",
            params.keywords, params.location
        ),
    )?;
    text_element(&mut writer, "lastBuildDate", &now)?;

    match offers {
        Some(offers) => {
            for offer in offers {
                let link = job_view_url(&offer.id);
                write_item(
                    &mut writer,
                    &item_title(offer),
                    &link,
                    &offer.id,
                    &offer.created_at.to_rfc2822(),
                    &format!("{} at {}, {}", offer.title, offer.company, offer.location),
                )?;
            }
        }
        None => {
            write_item(
                &mut writer,
                "Feed not found",
                feed_url,
                "feed-not-found",
                &now,
                &format!(
                    "There is no feed for \"{}\" in \"{}\". Create it with POST /feeds first.",
                    params.keywords, params.location
                ),
            )?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    Ok(String::from_utf8(writer.into_inner())?)
}
