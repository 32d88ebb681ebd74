use async_trait::async_trait;
use fcnamecolor_core::{
    CharacterGuild, CharacterId, GuildId, GuildSummary, MemberRecord, MembersPage, RemoteError,
    RemoteResult, RosterClient,
};
use log::debug;
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use url::Url;

/// Looks up characters and free companies through a JSON lodestone API.
pub struct LodestoneClient {
    base_url: Url,
    client: Client,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Entry {
    #[serde(rename = "ID")]
    id: RawId,
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Pagination {
    page_total: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SearchResponse {
    results: Vec<Entry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CharacterResponse {
    free_company: Option<Entry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FreeCompany {
    #[serde(rename = "ID")]
    id: RawId,
    name: String,
    server: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FreeCompanyResponse {
    free_company: FreeCompany,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MembersResponse {
    pagination: Pagination,
    results: Vec<Entry>,
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

impl From<Entry> for MemberRecord {
    fn from(entry: Entry) -> Self {
        MemberRecord {
            id: entry.id.into_string(),
            name: entry.name,
        }
    }
}

impl SearchResponse {
    /// The search is fuzzy, only an exact name match counts
    fn find_exact(self, name: &str) -> RemoteResult<CharacterId> {
        self.results
            .into_iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.id.into_string())
            .ok_or(RemoteError::NotFound)
    }
}

impl From<CharacterResponse> for Option<CharacterGuild> {
    fn from(response: CharacterResponse) -> Self {
        response.free_company.map(|entry| CharacterGuild {
            id: entry.id.into_string(),
            name: entry.name,
        })
    }
}

impl From<FreeCompanyResponse> for GuildSummary {
    fn from(response: FreeCompanyResponse) -> Self {
        let fc = response.free_company;

        GuildSummary {
            id: fc.id.into_string(),
            name: fc.name,
            world: fc.server,
        }
    }
}

impl From<MembersResponse> for MembersPage {
    fn from(response: MembersResponse) -> Self {
        MembersPage {
            members: response.results.into_iter().map(Into::into).collect(),
            // An empty free company still has one page
            total_pages: response.pagination.page_total.max(1),
        }
    }
}

impl LodestoneClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://xivapi.com";

    pub fn new(base_url: &str) -> RemoteResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| RemoteError::Other(e.to_string()))?;

        if base_url.cannot_be_a_base() {
            return Err(RemoteError::Other(format!("{} can't be a base url", base_url)));
        }

        Ok(Self {
            base_url,
            client: Client::new(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();

        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }

        url
    }

    async fn get<T>(&self, url: Url) -> RemoteResult<T>
    where
        T: DeserializeOwned,
    {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RemoteError::FetchError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_unsuccessful_request(response, status).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::FetchError(e.to_string()))?;

        parse(&body)
    }
}

#[async_trait]
impl RosterClient for LodestoneClient {
    async fn resolve_character_id(&self, name: &str, world: &str) -> RemoteResult<CharacterId> {
        let mut url = self.endpoint(&["character", "search"]);
        url.query_pairs_mut()
            .append_pair("name", name)
            .append_pair("server", world);

        let response: SearchResponse = self.get(url).await?;
        response.find_exact(name)
    }

    async fn fetch_character_guild(
        &self,
        character_id: &CharacterId,
    ) -> RemoteResult<Option<CharacterGuild>> {
        let mut url = self.endpoint(&["character", character_id]);
        url.query_pairs_mut().append_pair("data", "FC");

        let response: CharacterResponse = self.get(url).await?;
        Ok(response.into())
    }

    async fn fetch_guild(&self, guild_id: &GuildId) -> RemoteResult<GuildSummary> {
        let url = self.endpoint(&["freecompany", guild_id]);

        let response: FreeCompanyResponse = self.get(url).await?;
        Ok(response.into())
    }

    async fn fetch_members_page(
        &self,
        guild_id: &GuildId,
        page: u32,
    ) -> RemoteResult<MembersPage> {
        let mut url = self.endpoint(&["freecompany", guild_id, "members"]);
        url.query_pairs_mut().append_pair("page", &page.to_string());

        let response: MembersResponse = self.get(url).await?;
        Ok(response.into())
    }
}

fn parse<T>(body: &str) -> RemoteResult<T>
where
    T: DeserializeOwned,
{
    serde_json::from_str(body).map_err(|e| RemoteError::ParseError(e.to_string()))
}

async fn handle_unsuccessful_request(response: Response, status: StatusCode) -> RemoteError {
    if status == StatusCode::NOT_FOUND {
        return RemoteError::NotFound;
    }

    match response.text().await {
        Ok(text) => RemoteError::FetchError(format!("{}: {}", status, text)),
        Err(e) => RemoteError::FetchError(format!("{}: {}", status, e)),
    }
}

#[cfg(test)]
mod test {
    use fcnamecolor_core::{CharacterGuild, GuildSummary, MembersPage, RemoteError};

    use super::{
        parse, CharacterResponse, FreeCompanyResponse, LodestoneClient, MembersResponse,
        SearchResponse,
    };

    #[test]
    fn search_only_accepts_exact_names() {
        let body = r#"{
            "Pagination": { "Page": 1, "PageTotal": 1 },
            "Results": [
                { "ID": 730968, "Name": "Aria Vale", "Server": "Gaia" },
                { "ID": 12345, "Name": "Aria", "Server": "Gaia" }
            ]
        }"#;

        let response: SearchResponse = parse(body).unwrap();
        assert_eq!(response.clone().find_exact("Aria").unwrap(), "12345");
        assert!(matches!(
            response.find_exact("Ari"),
            Err(RemoteError::NotFound)
        ));
    }

    #[test]
    fn character_without_free_company() {
        let with: CharacterResponse = parse(
            r#"{ "Character": {}, "FreeCompany": { "ID": "9231253336202687179", "Name": "Brass Blades" } }"#,
        )
        .unwrap();
        let without: CharacterResponse = parse(r#"{ "Character": {}, "FreeCompany": null }"#).unwrap();

        assert_eq!(
            Option::<CharacterGuild>::from(with),
            Some(CharacterGuild {
                id: "9231253336202687179".into(),
                name: "Brass Blades".into()
            })
        );
        assert_eq!(Option::<CharacterGuild>::from(without), None);
    }

    #[test]
    fn free_company_summary() {
        let response: FreeCompanyResponse = parse(
            r#"{ "FreeCompany": { "ID": "555", "Name": "Lantern Watch", "Server": "Gaia", "Tag": "LNTN" } }"#,
        )
        .unwrap();

        assert_eq!(
            GuildSummary::from(response),
            GuildSummary {
                id: "555".into(),
                name: "Lantern Watch".into(),
                world: "Gaia".into()
            }
        );
    }

    #[test]
    fn members_page_with_total() {
        let response: MembersResponse = parse(
            r#"{
                "Pagination": { "Page": 2, "PageTotal": 3 },
                "Results": [
                    { "ID": 1, "Name": "Bryn" },
                    { "ID": "2", "Name": "Cato" }
                ]
            }"#,
        )
        .unwrap();

        let page = MembersPage::from(response);
        let names: Vec<_> = page.members.iter().map(|m| m.name.as_str()).collect();

        assert_eq!(page.total_pages, 3);
        assert_eq!(names, vec!["Bryn", "Cato"]);
        assert_eq!(page.members[0].id, "1");
    }

    #[test]
    fn malformed_body_is_a_parse_error() {
        let result = parse::<MembersResponse>(r#"{ "Results": "nope" }"#);

        assert!(matches!(result, Err(RemoteError::ParseError(_))));
    }

    #[test]
    fn endpoints_keep_base_path() {
        let client = LodestoneClient::new("https://lodestone.example/api/").unwrap();
        let url = client.endpoint(&["freecompany", "555", "members"]);

        assert_eq!(url.as_str(), "https://lodestone.example/api/freecompany/555/members");
        assert!(LodestoneClient::new("not a url").is_err());
    }
}
