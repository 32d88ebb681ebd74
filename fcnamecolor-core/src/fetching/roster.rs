use futures_util::future::try_join_all;
use log::debug;

use crate::{GuildId, MemberRecord, MembersPage, RemoteError, RosterClient};

use super::{FetchError, RemoteResultExt};

/// Fetches the complete member list of a guild.
///
/// The first page tells how many pages there are, the rest are requested concurrently.
/// If any page fails the whole roster is discarded.
pub async fn fetch_roster<C>(client: &C, guild_id: &GuildId) -> Result<Vec<MemberRecord>, FetchError>
where
    C: RosterClient + ?Sized,
{
    debug!("Fetching members page 1 of {}", guild_id);
    let first = client
        .fetch_members_page(guild_id, 1)
        .await
        .not_found_or(FetchError::GuildNotFound(guild_id.clone()))?;

    let remaining = (2..=first.total_pages).map(|page| async move {
        debug!("Fetching members page {} of {}", page, guild_id);

        client
            .fetch_members_page(guild_id, page)
            .await
            .map_err(|source| partial_page(guild_id, page, source))
    });

    let rest = try_join_all(remaining).await?;

    Ok(merge_pages(first, rest))
}

/// Concatenates pages in ascending page order
fn merge_pages(first: MembersPage, rest: Vec<MembersPage>) -> Vec<MemberRecord> {
    let mut members = first.members;

    for page in rest {
        members.extend(page.members);
    }

    members
}

fn partial_page(guild_id: &GuildId, page: u32, source: RemoteError) -> FetchError {
    FetchError::PartialPage {
        guild_id: guild_id.clone(),
        page,
        source,
    }
}

#[cfg(test)]
mod test {
    use super::fetch_roster;
    use crate::{testing::MockRosterClient, FetchError, RemoteError};

    #[tokio::test]
    async fn every_page_count_merges_in_order() {
        for pages in 1..=5u32 {
            let client = MockRosterClient::new();
            client.add_paged_guild("9231", "Brass Blades", "Gaia", pages, 3);

            let members = fetch_roster(&client, &"9231".to_string()).await.unwrap();
            let names: Vec<_> = members.iter().map(|m| m.name.clone()).collect();

            let expected: Vec<_> = (1..=pages)
                .flat_map(|page| (0..3).map(move |i| format!("Member {page}-{i}")))
                .collect();

            assert_eq!(names, expected);
            assert_eq!(client.page_requests("9231"), pages as usize);
        }
    }

    #[tokio::test]
    async fn a_failing_page_fails_the_roster() {
        let client = MockRosterClient::new();
        client.add_paged_guild("9231", "Brass Blades", "Gaia", 3, 2);
        client.fail_page("9231", 3, RemoteError::FetchError("timed out".into()));

        let result = fetch_roster(&client, &"9231".to_string()).await;

        assert!(matches!(
            result,
            Err(FetchError::PartialPage { page: 3, .. })
        ));
    }

    #[tokio::test]
    async fn missing_guild_is_not_found() {
        let client = MockRosterClient::new();

        let result = fetch_roster(&client, &"404".to_string()).await;

        assert!(matches!(result, Err(FetchError::GuildNotFound(id)) if id == "404"));
    }
}
