//! Async client for the devmatch HTTP API. One free function per route.

use anyhow::{anyhow, Result};
use devmatch_common::ErrorResponse;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

pub use reqwest::Client;

/// Base address of a devmatch server, e.g. `http://localhost:3000`.
#[derive(Clone, Debug)]
pub struct Server(pub String);
impl Server {
    pub fn url(&self, path: &str) -> String {
        self.0.trim_end_matches('/').to_string() + path
    }
}

trait Authed {
    fn authed(self, token: &devmatch_common::Token) -> Self;
}
impl Authed for RequestBuilder {
    fn authed(self, token: &devmatch_common::Token) -> Self {
        self.bearer_auth(&token.0)
    }
}

/// Turns non-2xx responses into errors carrying the server's message.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }
    match response.json::<ErrorResponse>().await {
        Ok(err) => Err(anyhow!("{status}: {} ({})", err.message, err.error)),
        Err(_) => Err(anyhow!("{status}")),
    }
}

pub mod client {
    use devmatch_common::{
        ConnectionsResponse, DeleteUserRequest, LoginRequest, MessageResponse, PasswordChange,
        ReceivedRequestsResponse, SessionResponse, SignupRequest, Token, UserId, UserResponse, UserSummary,
        UserView,
    };
    use reqwest::Client;
    use serde_json::{Map, Value};
    use anyhow::Result;
    use crate::{decode, Authed, Server};

    pub async fn signup(client: &Client, server: &Server, req: &SignupRequest) -> Result<UserView> {
        let resp: UserResponse = decode(client.post(server.url("/signup")).json(req).send().await?).await?;
        Ok(resp.user)
    }
    pub async fn login(client: &Client, server: &Server, email: &str, password: &str) -> Result<SessionResponse> {
        let req = LoginRequest { email: email.to_string(), password: password.to_string() };
        decode(client.post(server.url("/login")).json(&req).send().await?).await
    }
    pub async fn logout(client: &Client, server: &Server, token: &Token) -> Result<()> {
        decode::<MessageResponse>(client.post(server.url("/logout")).authed(token).send().await?).await?;
        Ok(())
    }
    pub async fn view_profile(client: &Client, server: &Server, token: &Token) -> Result<UserView> {
        let resp: UserResponse = decode(client.get(server.url("/profile/view")).authed(token).send().await?).await?;
        Ok(resp.user)
    }
    pub async fn edit_profile(client: &Client, server: &Server, token: &Token, fields: &Map<String, Value>) -> Result<UserView> {
        let resp: UserResponse = decode(client.patch(server.url("/profile/edit")).authed(token).json(fields).send().await?).await?;
        Ok(resp.user)
    }
    pub async fn change_password(client: &Client, server: &Server, token: &Token, old: &str, new: &str) -> Result<()> {
        let req = PasswordChange { old_password: old.to_string(), new_password: new.to_string() };
        decode::<MessageResponse>(client.patch(server.url("/profile/password")).authed(token).json(&req).send().await?).await?;
        Ok(())
    }
    pub async fn send_interest(client: &Client, server: &Server, token: &Token, target: &UserId) -> Result<()> {
        post_action(client, server, token, &format!("/request/send/interested/{target}")).await
    }
    pub async fn ignore(client: &Client, server: &Server, token: &Token, target: &UserId) -> Result<()> {
        post_action(client, server, token, &format!("/request/send/ignored/{target}")).await
    }
    pub async fn accept_request(client: &Client, server: &Server, token: &Token, requester: &UserId) -> Result<()> {
        post_action(client, server, token, &format!("/request/review/accepted/{requester}")).await
    }
    pub async fn reject_request(client: &Client, server: &Server, token: &Token, requester: &UserId) -> Result<()> {
        post_action(client, server, token, &format!("/request/review/rejected/{requester}")).await
    }
    pub async fn connections(client: &Client, server: &Server, token: &Token) -> Result<Vec<UserSummary>> {
        let resp: ConnectionsResponse = decode(client.get(server.url("/connections")).authed(token).send().await?).await?;
        Ok(resp.connections)
    }
    pub async fn received_requests(client: &Client, server: &Server, token: &Token) -> Result<Vec<UserSummary>> {
        let resp: ReceivedRequestsResponse = decode(client.get(server.url("/request/received")).authed(token).send().await?).await?;
        Ok(resp.received_requests)
    }
    pub async fn feed(client: &Client, server: &Server) -> Result<Vec<UserView>> {
        decode(client.get(server.url("/feed")).send().await?).await
    }
    pub async fn find_user(client: &Client, server: &Server, email: &str) -> Result<UserView> {
        let resp: UserResponse = decode(client.get(server.url("/users")).query(&[("email", email)]).send().await?).await?;
        Ok(resp.user)
    }
    pub async fn update_user(client: &Client, server: &Server, id: &UserId, fields: &Map<String, Value>) -> Result<UserView> {
        let resp: UserResponse = decode(client.patch(server.url(&format!("/user/{id}"))).json(fields).send().await?).await?;
        Ok(resp.user)
    }
    pub async fn delete_user(client: &Client, server: &Server, id: &UserId) -> Result<UserView> {
        let req = DeleteUserRequest { id: id.clone() };
        decode(client.delete(server.url("/user")).json(&req).send().await?).await
    }

    async fn post_action(client: &Client, server: &Server, token: &Token, path: &str) -> Result<()> {
        decode::<MessageResponse>(client.post(server.url(path)).authed(token).send().await?).await?;
        Ok(())
    }
}
