//! Google Scholar scraping client.
//!
//! Scholar has no API; results are scraped from the HTML result pages with
//! anti-detection measures: a browser user agent, persisted cookies, and a
//! randomized delay between pages. CAPTCHA pages abort the source.

use regex::Regex;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::clients::{year_in_range, SearchQuery};
use crate::cookies::CookieManager;
use crate::error::{Result, ScoutError};
use crate::record::{clean_author, PaperRecord, Source};

/// Default Google Scholar URL
pub const DEFAULT_SCHOLAR_URL: &str = "https://scholar.google.com";

/// Results per Scholar page
const PAGE_SIZE: usize = 10;

/// User agent string for requests
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Scraper options beyond the shared [`SearchQuery`].
#[derive(Debug, Clone, Default)]
pub struct ScholarOptions {
    /// Proxy URL (e.g., "http://127.0.0.1:7890")
    pub proxy: Option<String>,
    /// Custom base URL for mirror sites
    pub base_url: Option<String>,
}

/// Search Google Scholar by scraping result pages.
pub async fn search(query: &SearchQuery, options: &ScholarOptions) -> Result<Vec<PaperRecord>> {
    let scholar_url = options
        .base_url
        .as_ref()
        .map(|s| s.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_SCHOLAR_URL.to_string());

    info!(query = %query.query, url = %scholar_url, "Starting Google Scholar query");

    let cookie_manager = CookieManager::default();
    let cookies = cookie_manager.load();
    let cookie_header = build_cookie_header(&cookies);

    if cookies.is_empty() {
        warn!("No cookies loaded. Run 'paperscout cookies import' to load cookies from a browser export.");
    }

    let client = build_http_client(options.proxy.as_deref())?;
    let pages = query.max_results.div_ceil(PAGE_SIZE);
    let mut records = Vec::new();

    for page_num in 0..pages {
        let start = page_num * PAGE_SIZE;
        let url = build_search_url(&scholar_url, query, start)?;
        debug!(page = page_num + 1, url = %url, "Fetching Scholar page");

        // Random delay to avoid detection
        let delay = rand::random::<u64>() % 1500 + 500;
        tokio::time::sleep(Duration::from_millis(delay)).await;

        match fetch_page(&client, &url, &cookie_header).await {
            Ok(html) => {
                if html.contains("Solving the above CAPTCHA") || html.contains("unusual traffic") {
                    warn!(page = page_num + 1, "CAPTCHA detected");
                    return Err(ScoutError::Captcha);
                }

                let page_records = parse_result_items(&html)?;
                info!(page = page_num + 1, count = page_records.len(), "Parsed results");

                if page_records.is_empty() {
                    break;
                }
                for record in page_records {
                    if records.len() >= query.max_results {
                        break;
                    }
                    records.push(record);
                }
            }
            Err(e) => {
                error!(page = page_num + 1, error = %e, "Failed to fetch page");
                // Continue with other pages instead of failing completely
            }
        }

        if records.len() >= query.max_results {
            break;
        }
    }

    info!(total = records.len(), "Google Scholar query complete");
    Ok(records)
}

/// Build cookie header string from cookie list
fn build_cookie_header(cookies: &[crate::cookies::Cookie]) -> String {
    cookies
        .iter()
        .filter(|c| c.domain.contains("google"))
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Build HTTP client with optional proxy
fn build_http_client(proxy: Option<&str>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .cookie_store(true);

    if let Some(proxy_url) = proxy {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| ScoutError::Config(format!("Invalid proxy URL '{}': {}", proxy_url, e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| ScoutError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Build Google Scholar search URL
fn build_search_url(base_url: &str, query: &SearchQuery, start: usize) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/scholar", base_url))
        .map_err(|e| ScoutError::Config(format!("Invalid base URL: {}", e)))?;

    {
        let mut params = url.query_pairs_mut();
        params.append_pair("q", &query.query);
        params.append_pair("hl", "en-US"); // Force English locale for consistent parsing
        params.append_pair("start", &start.to_string());
        params.append_pair("as_sdt", "0,5"); // Articles only, excludes patents
        if let Some(lo) = query.year_min {
            params.append_pair("as_ylo", &lo.to_string());
        }
        if let Some(hi) = query.year_max {
            params.append_pair("as_yhi", &hi.to_string());
        }
    }

    Ok(url)
}

/// Fetch page content using HTTP client with cookies
async fn fetch_page(client: &reqwest::Client, url: &Url, cookie_header: &str) -> Result<String> {
    let mut request = client
        .get(url.as_str())
        .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8")
        .header("Accept-Language", "en-US,en;q=0.9")
        .header("Upgrade-Insecure-Requests", "1");

    if !cookie_header.is_empty() {
        request = request.header("Cookie", cookie_header);
    }

    let response = request.send().await?;

    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(ScoutError::RateLimited(60));
    }

    if !status.is_success() {
        return Err(ScoutError::Api {
            code: status.as_u16() as i32,
            message: format!("HTTP error: {}", status),
        });
    }

    response.text().await.map_err(ScoutError::Network)
}

/// Parse Google Scholar HTML to extract article records.
pub fn parse_result_items(html: &str) -> Result<Vec<PaperRecord>> {
    let document = Html::parse_document(html);

    let item_selector =
        Selector::parse("div.gs_r.gs_or.gs_scl").map_err(|e| ScoutError::Parse(e.to_string()))?;
    let title_selector =
        Selector::parse("h3.gs_rt").map_err(|e| ScoutError::Parse(e.to_string()))?;
    let link_selector =
        Selector::parse("h3.gs_rt a").map_err(|e| ScoutError::Parse(e.to_string()))?;
    let meta_selector =
        Selector::parse("div.gs_a").map_err(|e| ScoutError::Parse(e.to_string()))?;
    let snippet_selector =
        Selector::parse("div.gs_rs").map_err(|e| ScoutError::Parse(e.to_string()))?;
    let cite_selector =
        Selector::parse("div.gs_fl.gs_flb a").map_err(|e| ScoutError::Parse(e.to_string()))?;

    let year_regex =
        Regex::new(r"\b(19|20)\d{2}\b").map_err(|e| ScoutError::Parse(e.to_string()))?;
    // Support both English ("Cited by X") and Chinese ("被引用 X 次") formats
    let cite_regex = Regex::new(r"(?:Cited by\s*|被引用\s*)(\d+)")
        .map_err(|e| ScoutError::Parse(e.to_string()))?;

    let mut records = Vec::new();

    for item in document.select(&item_selector) {
        let mut record = PaperRecord::from_source(Source::GoogleScholar);

        // Title and URL
        if let Some(title_elem) = item.select(&title_selector).next() {
            if let Some(link) = item.select(&link_selector).next() {
                record.title = link.text().collect::<String>().trim().to_string();
                record.url = link.value().attr("href").unwrap_or("").to_string();
            } else {
                record.title = title_elem.text().collect::<String>().trim().to_string();
            }
        }

        // Author, year, venue from the green metadata line
        if let Some(meta_elem) = item.select(&meta_selector).next() {
            let meta_text = meta_elem.text().collect::<String>();
            let parts: Vec<&str> = meta_text.split(" - ").collect();

            if !parts.is_empty() {
                record.authors = parts[0]
                    .split(',')
                    .map(clean_author)
                    .filter(|n| !n.is_empty() && n.as_str() != "…")
                    .collect();
            }

            if parts.len() >= 2 {
                let venue_year = parts[1];
                if let Some(caps) = year_regex.captures(venue_year) {
                    if let Some(year_match) = caps.get(0) {
                        record.year = year_match.as_str().parse().ok();
                        let venue = venue_year[..year_match.start()].trim().trim_end_matches(',');
                        record.venue = venue.to_string();
                    }
                } else {
                    record.venue = venue_year.trim().to_string();
                }
            }
        }

        // Snippet stands in for an abstract
        if let Some(snippet_elem) = item.select(&snippet_selector).next() {
            record.abstract_text = snippet_elem.text().collect::<String>().trim().to_string();
        }

        // Citation count from the "Cited by" footer link
        for link in item.select(&cite_selector) {
            let text = link.text().collect::<String>();
            let href = link.value().attr("href").unwrap_or("");
            if href.contains("cites=") {
                if let Some(caps) = cite_regex.captures(&text) {
                    if let Some(count) = caps.get(1) {
                        record.citations = count.as_str().parse().ok();
                        break;
                    }
                }
            }
        }

        if !record.title.is_empty() {
            records.push(record);
        }
    }

    Ok(records)
}

/// Variant of [`search`] that also drops records outside the year window,
/// covering mirrors that ignore `as_ylo`/`as_yhi`.
pub async fn search_filtered(
    query: &SearchQuery,
    options: &ScholarOptions,
) -> Result<Vec<PaperRecord>> {
    let records = search(query, options).await?;
    Ok(records
        .into_iter()
        .filter(|r| year_in_range(r.year, query))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_search_url() {
        let mut q = SearchQuery::new("machine learning");
        q.year_min = Some(2020);
        let url = build_search_url("https://scholar.google.com", &q, 0)
            .expect("Failed to build URL");
        assert!(url.as_str().contains("q=machine+learning"));
        assert!(url.as_str().contains("as_ylo=2020"));
    }

    #[test]
    fn test_parse_empty_html() {
        let records = parse_result_items("<html><body></body></html>").expect("Parse failed");
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_result_item() {
        let html = r#"<html><body>
            <div class="gs_r gs_or gs_scl">
              <h3 class="gs_rt"><a href="https://example.org/paper">Deep learning</a></h3>
              <div class="gs_a">Y LeCun, Y Bengio - Nature, 2015 - nature.com</div>
              <div class="gs_rs">Deep learning allows computational models...</div>
              <div class="gs_fl gs_flb">
                <a href="/scholar?cites=5362332738201102290">Cited by 65000</a>
              </div>
            </div>
        </body></html>"#;

        let records = parse_result_items(html).expect("Parse failed");
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.title, "Deep learning");
        assert_eq!(record.url, "https://example.org/paper");
        assert_eq!(record.authors, vec!["Y LeCun", "Y Bengio"]);
        assert_eq!(record.year, Some(2015));
        assert_eq!(record.venue, "Nature");
        assert_eq!(record.citations, Some(65000));
        assert_eq!(record.source, Source::GoogleScholar);
    }
}
