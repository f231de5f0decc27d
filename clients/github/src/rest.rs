use log::warn;
use repostats::api::{Direction, Error, Event, EventKind, Page, PageInfo, PageRequest, RepoId, Result};
use reqwest::header;

use crate::payload::{RestRepo, Stargazer};
use crate::{endpoint, transport, GithubClient};

const STAR_MEDIA_TYPE: &str = "application/vnd.github.star+json";

/// Highest stargazers page GitHub serves; later ones answer 422.
pub const MAX_REST_PAGE: u64 = 400;

/// Stargazers by page number. Cursors are page numbers, going down when
/// walking backward from the last page.
///
/// Pages past [`MAX_REST_PAGE`] are never requested: a backward walk on a
/// larger repository starts at that page instead of the newest stars, and a
/// forward walk ends there.
pub(crate) async fn stargazers_page(
    client: &GithubClient,
    repo: &RepoId,
    kind: EventKind,
    request: PageRequest,
) -> Result<Page> {
    if kind != EventKind::Stars {
        return Err(Error::Unsupported {
            kind,
            direction: request.direction,
        });
    }
    let page = match (request.cursor, request.direction) {
        (Some(cursor), _) => cursor
            .parse::<u64>()
            .map_err(|_| Error::Decode(format!("Invalid page cursor {}", cursor)))?,
        (None, Direction::Forward) => 1,
        (None, Direction::Backward) => last_page(client, repo, request.page_size).await?,
    };
    if page == 0 {
        return Ok(Page::default());
    }
    if page > MAX_REST_PAGE {
        if request.direction == Direction::Forward {
            warn!("{} stargazers past page {} are out of REST reach", repo, MAX_REST_PAGE);
            return Ok(Page::default());
        }
        warn!(
            "{} has {} stargazer pages, walking back from page {} without the newest stars",
            repo, page, MAX_REST_PAGE
        );
    }
    let page = page.min(MAX_REST_PAGE);

    let url = endpoint(
        &client.github_url,
        ["repos", repo.owner.as_str(), repo.name.as_str(), "stargazers"],
    )?;
    let response = client
        .client
        .get(url)
        .header(header::ACCEPT, STAR_MEDIA_TYPE)
        .query(&[("per_page", request.page_size.to_string()), ("page", page.to_string())])
        .send()
        .await
        .map_err(transport)?;
    let stargazers: Vec<Stargazer> = client.read_response(response).await?;
    let full = stargazers.len() as u64 >= request.page_size as u64;
    let mut events: Vec<Event> = stargazers
        .into_iter()
        .map(|stargazer| Event::new(stargazer.starred_at, stargazer.user.login))
        .collect();

    let page_info = match request.direction {
        Direction::Forward => {
            if full && page == MAX_REST_PAGE {
                warn!("{} has more stargazers than the REST API pages through", repo);
            }
            PageInfo::new(full && page < MAX_REST_PAGE, Some((page + 1).to_string()))
        }
        Direction::Backward => {
            events.reverse();
            PageInfo::new(page > 1, Some((page - 1).to_string()))
        }
    };
    Ok(Page::new(events, page_info))
}

async fn last_page(client: &GithubClient, repo: &RepoId, page_size: u32) -> Result<u64> {
    let url = endpoint(&client.github_url, ["repos", repo.owner.as_str(), repo.name.as_str()])?;
    let response = client.client.get(url).send().await.map_err(transport)?;
    let body: RestRepo = client.read_response(response).await?;
    let page_size = page_size.max(1) as u64;
    Ok((body.stargazers_count + page_size - 1) / page_size)
}
