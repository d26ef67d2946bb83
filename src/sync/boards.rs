//! Kanban boards: a board owns columns, and cards that sit in a column.

use anyhow::{bail, Result};
use serde_json::json;
use uuid::Uuid;

use super::SyncService;
use crate::entities::{board, board_card, board_column, Ownership, SyncStatus};
use crate::utils::now_millis;

/// A board with its columns and cards, both ordered by position.
#[derive(Clone, Debug, PartialEq)]
pub struct BoardTree {
    pub board: board::Model,
    pub columns: Vec<board_column::Model>,
    pub cards: Vec<board_card::Model>,
}

impl BoardTree {
    pub fn cards_in(&self, column_id: &str) -> impl Iterator<Item = &board_card::Model> {
        let column_id = column_id.to_owned();
        self.cards.iter().filter(move |card| card.column_id == column_id)
    }
}

impl SyncService {
    pub async fn create_board(&self, title: &str, description: Option<&str>) -> Result<board::Model> {
        let now = now_millis();
        self.create(board::Model {
            id: Uuid::new_v4().to_string(),
            user_id: String::new(),
            title: title.to_owned(),
            description: description.map(str::to_owned),
            created_at: now,
            updated_at: now,
            sync_status: SyncStatus::Created,
            ownership: Ownership::Owned,
        })
        .await
    }

    /// Appends a column at the end of the board.
    pub async fn add_column(&self, board_id: &str, title: &str) -> Result<board_column::Model> {
        let position = self
            .replica
            .query::<board_column::Model, _>(|column| column.board_id == board_id)
            .await?
            .len();

        self.create(board_column::Model {
            id: Uuid::new_v4().to_string(),
            user_id: String::new(),
            board_id: board_id.to_owned(),
            title: title.to_owned(),
            position: i32::try_from(position)?,
            created_at: now_millis(),
            sync_status: SyncStatus::Created,
        })
        .await
    }

    /// Appends a card at the bottom of a column.
    pub async fn add_card(&self, board_id: &str, column_id: &str, title: &str) -> Result<board_card::Model> {
        self.ensure_column_on_board(board_id, column_id).await?;
        let position = self
            .replica
            .query::<board_card::Model, _>(|card| card.column_id == column_id)
            .await?
            .len();

        let now = now_millis();
        self.create(board_card::Model {
            id: Uuid::new_v4().to_string(),
            user_id: String::new(),
            board_id: board_id.to_owned(),
            column_id: column_id.to_owned(),
            title: title.to_owned(),
            description: None,
            position: i32::try_from(position)?,
            created_at: now,
            updated_at: now,
            sync_status: SyncStatus::Created,
        })
        .await
    }

    /// Moves a card to `position` within `column_id` on the same board.
    pub async fn move_card(&self, card_id: &str, column_id: &str, position: i32) -> Result<board_card::Model> {
        let card = self
            .replica
            .get::<board_card::Model>(card_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("board-card {card_id} not found"))?;
        self.ensure_column_on_board(&card.board_id, column_id).await?;

        self.update::<board_card::Model>(card_id, json!({ "columnId": column_id, "position": position }))
            .await
    }

    /// Deletes a board together with its columns and cards.
    pub async fn delete_board(&self, board_id: &str) -> Result<bool> {
        self.delete::<board::Model>(board_id).await
    }

    pub async fn board_tree(&self, board_id: &str) -> Result<Option<BoardTree>> {
        let Some(board) = self.replica.get::<board::Model>(board_id).await? else {
            return Ok(None);
        };
        let mut columns = self
            .replica
            .query::<board_column::Model, _>(|column| column.board_id == board_id)
            .await?;
        columns.sort_by_key(|column| column.position);
        let mut cards = self
            .replica
            .query::<board_card::Model, _>(|card| card.board_id == board_id)
            .await?;
        cards.sort_by_key(|card| card.position);

        Ok(Some(BoardTree { board, columns, cards }))
    }

    async fn ensure_column_on_board(&self, board_id: &str, column_id: &str) -> Result<()> {
        match self.replica.get::<board_column::Model>(column_id).await? {
            Some(column) if column.board_id == board_id => Ok(()),
            Some(_) => bail!("board-column {column_id} belongs to another board"),
            None => bail!("board-column {column_id} not found"),
        }
    }
}
