//! Login-based discovery from the concall listing site.
//!
//! The site is a Django admin-style changelist: a form login guarded by a
//! CSRF token, then a table with one row per call. Two row layouts are
//! understood:
//! - rows with `.field-company_display`, `.field-action_display` and
//!   `.field-pub_date` cells
//! - plain `table#result_list` rows with the company in `<th>` and the
//!   document link in the first `<td><a>`

use std::fmt;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate};
use reqwest::Client;
use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_TYPE, REFERER};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

use super::{Discovery, DiscoveryError};
use crate::http::{LISTING_TIMEOUT, build_client};
use crate::source::SourceDescriptor;
use crate::user_agent::BROWSER_USER_AGENT;

/// Default listing site.
pub const DEFAULT_LISTING_BASE_URL: &str = "https://www.screener.in";

const LOGIN_PATH: &str = "login/";
const LISTING_PATH: &str = "concalls/";

/// Date format of the listing's publication column ("05 March 2025").
const LISTING_DATE_FORMAT: &str = "%d %B %Y";
const LISTING_DATE_FALLBACK_FORMAT: &str = "%B %d, %Y";

#[allow(clippy::expect_used)]
fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

static CSRF_INPUT: LazyLock<Selector> =
    LazyLock::new(|| selector("input[name=csrfmiddlewaretoken]"));
static ROWS: LazyLock<Selector> = LazyLock::new(|| selector("tr"));
static COMPANY_CELL: LazyLock<Selector> =
    LazyLock::new(|| selector(".field-company_display span, .field-company_display"));
static ACTION_LINK: LazyLock<Selector> = LazyLock::new(|| selector(".field-action_display a[href]"));
static DATE_CELL: LazyLock<Selector> = LazyLock::new(|| selector(".field-pub_date"));
static HEADER_CELL: LazyLock<Selector> = LazyLock::new(|| selector("th"));
static DATA_LINK: LazyLock<Selector> = LazyLock::new(|| selector("td a[href]"));
static LOGIN_FORM_PASSWORD: LazyLock<Selector> =
    LazyLock::new(|| selector("input[name=password]"));

/// Listing-site account.
#[derive(Clone)]
pub struct ListingCredentials {
    pub username: String,
    pub password: String,
}

impl ListingCredentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for ListingCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListingCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Which publication dates to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateFilter {
    /// Keep every row.
    #[default]
    Any,
    /// Keep rows published the day before the run (local time).
    Yesterday,
    /// Keep rows published on this date.
    On(NaiveDate),
}

impl DateFilter {
    /// Parses `any`, `yesterday` or an ISO date.
    ///
    /// # Errors
    ///
    /// Returns a description of the accepted forms.
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "any" | "all" => Ok(Self::Any),
            "yesterday" => Ok(Self::Yesterday),
            other => NaiveDate::parse_from_str(other, "%Y-%m-%d")
                .map(Self::On)
                .map_err(|_| format!("expected `any`, `yesterday` or YYYY-MM-DD, got {raw:?}")),
        }
    }

    /// Concrete date this filter selects, given today's date.
    #[must_use]
    pub fn target(self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Any => None,
            Self::Yesterday => today.checked_sub_days(Days::new(1)),
            Self::On(date) => Some(date),
        }
    }
}

/// One scraped listing row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    pub company: String,
    pub link: Url,
    /// Publication label exactly as shown.
    pub published_raw: Option<String>,
    /// Parsed publication date, when the label is a date.
    pub published: Option<NaiveDate>,
}

impl ListingRow {
    fn into_descriptor(self) -> SourceDescriptor {
        let descriptor = SourceDescriptor::new(self.company, self.link);
        match self.published_raw {
            Some(raw) => descriptor.published_on(raw),
            None => descriptor,
        }
    }
}

/// Extracts rows from a listing page, resolving links against `page_url`.
///
/// Rows without a company label or a link are ignored.
#[must_use]
pub fn parse_listing(html: &str, page_url: &Url) -> Vec<ListingRow> {
    let document = Html::parse_document(html);
    document
        .select(&ROWS)
        .filter_map(|row| parse_row(row, page_url))
        .collect()
}

fn parse_row(row: ElementRef<'_>, page_url: &Url) -> Option<ListingRow> {
    let (company, href) = match row.select(&ACTION_LINK).next() {
        Some(action) => (
            first_text(row, &COMPANY_CELL).or_else(|| first_text(row, &HEADER_CELL))?,
            action.value().attr("href")?,
        ),
        None => (
            first_text(row, &HEADER_CELL)?,
            row.select(&DATA_LINK).next()?.value().attr("href")?,
        ),
    };
    let link = page_url.join(href.trim()).ok()?;
    let published_raw = first_text(row, &DATE_CELL);
    let published = published_raw.as_deref().and_then(parse_listing_date);

    Some(ListingRow {
        company,
        link,
        published_raw,
        published,
    })
}

fn first_text(row: ElementRef<'_>, selector: &Selector) -> Option<String> {
    row.select(selector)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|text| !text.is_empty())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_listing_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, LISTING_DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(raw, LISTING_DATE_FALLBACK_FORMAT))
        .ok()
}

fn find_csrf_token(html: &str) -> Option<String> {
    Html::parse_document(html)
        .select(&CSRF_INPUT)
        .find_map(|input| input.value().attr("value").map(str::to_string))
        .filter(|token| !token.is_empty())
}

fn looks_like_login_page(html: &str) -> bool {
    Html::parse_document(html)
        .select(&LOGIN_FORM_PASSWORD)
        .next()
        .is_some()
}

/// Discovers sources by logging into the listing site and scraping its table.
#[derive(Debug, Clone)]
pub struct ScreenerDiscovery {
    client: Client,
    base_url: Url,
    credentials: ListingCredentials,
    filter: DateFilter,
}

impl ScreenerDiscovery {
    /// Creates a discovery against [`DEFAULT_LISTING_BASE_URL`].
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::Http`] if the HTTP client cannot be built.
    pub fn new(credentials: ListingCredentials) -> Result<Self, DiscoveryError> {
        Self::with_base_url(DEFAULT_LISTING_BASE_URL, credentials)
    }

    /// Creates a discovery against another deployment of the site.
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::Config`] for an unparsable base URL and
    /// [`DiscoveryError::Http`] if the HTTP client cannot be built.
    pub fn with_base_url(
        base_url: &str,
        credentials: ListingCredentials,
    ) -> Result<Self, DiscoveryError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| DiscoveryError::config(format!("invalid listing URL {base_url}: {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let jar = Arc::new(Jar::default());
        let client = build_client(LISTING_TIMEOUT, BROWSER_USER_AGENT, Some(jar))
            .map_err(|e| DiscoveryError::http(base.as_str(), e.to_string()))?;
        Ok(Self {
            client,
            base_url: base,
            credentials,
            filter: DateFilter::Any,
        })
    }

    /// Keeps only rows matching `filter`.
    #[must_use]
    pub fn with_date_filter(mut self, filter: DateFilter) -> Self {
        self.filter = filter;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, DiscoveryError> {
        self.base_url
            .join(path)
            .map_err(|e| DiscoveryError::config(format!("invalid listing path {path}: {e}")))
    }

    async fn get_page(&self, url: &Url) -> Result<(Url, String), DiscoveryError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| DiscoveryError::http(url.as_str(), e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::http_status(url.as_str(), status.as_u16()));
        }
        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| DiscoveryError::http(url.as_str(), e.to_string()))?;
        Ok((final_url, body))
    }

    #[instrument(skip(self), fields(username = %self.credentials.username))]
    async fn login(&self) -> Result<(), DiscoveryError> {
        let login_url = self.endpoint(LOGIN_PATH)?;
        let (_, login_page) = self.get_page(&login_url).await?;
        let token = find_csrf_token(&login_page)
            .ok_or_else(|| DiscoveryError::login("no CSRF token on the login page"))?;

        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("csrfmiddlewaretoken", &token)
            .append_pair("username", &self.credentials.username)
            .append_pair("password", &self.credentials.password)
            .append_pair("next", &format!("/{LISTING_PATH}"))
            .finish();

        let response = self
            .client
            .post(login_url.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(REFERER, login_url.as_str())
            .body(body)
            .send()
            .await
            .map_err(|e| DiscoveryError::http(login_url.as_str(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::http_status(login_url.as_str(), status.as_u16()));
        }
        let landed = response.url().clone();
        let page = response
            .text()
            .await
            .map_err(|e| DiscoveryError::http(login_url.as_str(), e.to_string()))?;
        if landed.path() == login_url.path() && looks_like_login_page(&page) {
            return Err(DiscoveryError::login("credentials were rejected"));
        }

        debug!(landed = %landed, "logged in");
        Ok(())
    }
}

#[async_trait]
impl Discovery for ScreenerDiscovery {
    #[instrument(skip(self), fields(base = %self.base_url, filter = ?self.filter))]
    async fn discover(&self) -> Result<Vec<SourceDescriptor>, DiscoveryError> {
        self.login().await?;

        let listing_url = self.endpoint(LISTING_PATH)?;
        let (final_url, page) = self.get_page(&listing_url).await?;
        if final_url.path().ends_with(&format!("/{LOGIN_PATH}")) {
            return Err(DiscoveryError::login("session was not accepted by the listing page"));
        }

        let rows = parse_listing(&page, &final_url);
        let total = rows.len();
        let target = self.filter.target(Local::now().date_naive());

        let sources: Vec<SourceDescriptor> = rows
            .into_iter()
            .filter(|row| target.is_none_or(|date| row.published == Some(date)))
            .map(ListingRow::into_descriptor)
            .collect();

        info!(
            rows = total,
            sources = sources.len(),
            target_date = ?target,
            "listing scraped"
        );
        Ok(sources)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ACTION_LAYOUT: &str = r#"
        <table id="result_list"><tbody>
          <tr>
            <td class="field-company_display"><span> Acme   Ltd </span></td>
            <td class="field-action_display"><a href="/concalls/acme/q3.pdf">Transcript</a></td>
            <td class="field-pub_date">05 March 2025</td>
          </tr>
          <tr>
            <td class="field-company_display"><span>Globex</span></td>
            <td class="field-action_display"><a href="https://youtu.be/dQw4w9WgXcQ">Recording</a></td>
            <td class="field-pub_date">04 March 2025</td>
          </tr>
          <tr>
            <td class="field-company_display"><span>No Link Co</span></td>
            <td class="field-action_display"></td>
          </tr>
        </tbody></table>"#;

    const PLAIN_LAYOUT: &str = r#"
        <table id="result_list"><thead><tr><th>Company</th><th>Link</th></tr></thead><tbody>
          <tr><th>Initech</th><td><a href="docs/initech.pdf">pdf</a></td></tr>
        </tbody></table>"#;

    fn page() -> Url {
        Url::parse("https://listing.test/concalls/").unwrap()
    }

    #[test]
    fn test_parse_action_layout() {
        let rows = parse_listing(ACTION_LAYOUT, &page());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].company, "Acme Ltd");
        assert_eq!(
            rows[0].link.as_str(),
            "https://listing.test/concalls/acme/q3.pdf"
        );
        assert_eq!(rows[0].published, NaiveDate::from_ymd_opt(2025, 3, 5));
        assert_eq!(rows[0].published_raw.as_deref(), Some("05 March 2025"));
        assert_eq!(rows[1].link.host_str(), Some("youtu.be"));
    }

    #[test]
    fn test_parse_plain_layout() {
        let rows = parse_listing(PLAIN_LAYOUT, &page());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].company, "Initech");
        assert_eq!(
            rows[0].link.as_str(),
            "https://listing.test/concalls/docs/initech.pdf"
        );
        assert_eq!(rows[0].published, None);
    }

    #[test]
    fn test_date_filter_parse_and_target() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(DateFilter::parse("any").unwrap(), DateFilter::Any);
        assert_eq!(DateFilter::parse("Yesterday").unwrap(), DateFilter::Yesterday);
        assert_eq!(
            DateFilter::Yesterday.target(today),
            NaiveDate::from_ymd_opt(2025, 2, 28)
        );
        assert_eq!(
            DateFilter::parse("2025-03-05").unwrap().target(today),
            NaiveDate::from_ymd_opt(2025, 3, 5)
        );
        assert_eq!(DateFilter::Any.target(today), None);
        assert!(DateFilter::parse("last week").is_err());
    }

    #[test]
    fn test_listing_date_formats() {
        assert_eq!(
            parse_listing_date("5 March 2025"),
            NaiveDate::from_ymd_opt(2025, 3, 5)
        );
        assert_eq!(
            parse_listing_date("March 5, 2025"),
            NaiveDate::from_ymd_opt(2025, 3, 5)
        );
        assert_eq!(parse_listing_date("yesterday"), None);
    }

    #[test]
    fn test_find_csrf_token() {
        let html = r#"<form><input type="hidden" name="csrfmiddlewaretoken" value="tok123"></form>"#;
        assert_eq!(find_csrf_token(html).as_deref(), Some("tok123"));
        assert_eq!(find_csrf_token("<form></form>"), None);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = ListingCredentials::new("me@example.com", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("me@example.com"));
        assert!(!debug.contains("hunter2"));
    }
}
