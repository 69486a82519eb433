use serde::{ Serialize, Deserialize };

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "welcome")] Welcome {
        id: u64,
        content: String,
        timestamp: i64,
        quick_actions: Vec<String>,
    },
    #[serde(rename = "accepted")] Accepted {
        id: u64,
        content: String,
        timestamp: i64,
    },
    #[serde(rename = "typing")] Typing {
        active: bool,
    },
    #[serde(rename = "response")] Response {
        id: u64,
        content: String,
        timestamp: i64,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
}
