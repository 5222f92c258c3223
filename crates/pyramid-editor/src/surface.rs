//! Keyboard-driven block editing
//!
//! [`EditorSurface`] turns key events on a focused block into structural
//! edits on the chapter session and tells the view where focus goes next.
//! It knows nothing about rendering; a view feeds it [`KeyEvent`]s and text
//! input and applies the returned [`EditorEffect`].
//!
//! Failed store calls are reported to the session banner and produce
//! [`EditorEffect::Unchanged`].

use crate::error::EditorError;
use crate::figures::FigureService;
use crate::session::{ChapterSession, SaveOutcome};
use pyramid_content::{Block, BlockId, BlockType, FigureId, TextCursor};
use std::sync::Arc;

/// Keys with structural meaning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Printable character
    Char(char),
    /// Return
    Enter,
    /// Backspace
    Backspace,
    /// Forward delete
    Delete,
    /// Up arrow
    ArrowUp,
    /// Down arrow
    ArrowDown,
    /// Escape
    Escape,
}

/// A key press inside a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Key pressed
    pub key: Key,
    /// Shift held
    pub shift: bool,
    /// Caret position when pressed
    pub cursor: TextCursor,
}

impl KeyEvent {
    /// Unshifted key at `cursor`
    #[must_use]
    pub fn new(key: Key, cursor: TextCursor) -> Self {
        Self {
            key,
            shift: false,
            cursor,
        }
    }

    /// Same key with Shift held
    #[must_use]
    pub fn shifted(mut self) -> Self {
        self.shift = true;
        self
    }
}

/// Where the caret lands in a focused block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caret {
    /// Before the first character
    Start,
    /// After the last character
    End,
    /// At a character offset
    At(usize),
}

/// Focused block and caret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Focus {
    /// Focused block
    pub block_id: BlockId,
    /// Caret placement
    pub caret: Caret,
}

/// Block-type menu state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuState {
    /// Block the menu belongs to; `None` inserts at the chapter start
    pub anchor: Option<BlockId>,
    /// Convert the anchor instead of inserting after it
    pub replace: bool,
}

/// What the view should do after an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEffect {
    /// Move focus
    Focus(Focus),
    /// Show the block-type menu
    OpenMenu(MenuState),
    /// Hide the menu
    CloseMenu,
    /// Content changed in place; caret goes to `cursor`
    LineBreak {
        /// Caret after the break
        cursor: TextCursor,
    },
    /// Let the text field handle the key
    Default,
    /// The action failed; see the session banner
    Unchanged,
}

impl EditorEffect {
    fn focus(block_id: BlockId, caret: Caret) -> Self {
        Self::Focus(Focus { block_id, caret })
    }
}

/// Keyboard and drag handling for one chapter
#[derive(Debug)]
pub struct EditorSurface {
    session: Arc<ChapterSession>,
    focus: Option<Focus>,
    menu: Option<MenuState>,
}

impl EditorSurface {
    /// Surface over an open session
    #[must_use]
    pub fn new(session: Arc<ChapterSession>) -> Self {
        Self {
            session,
            focus: None,
            menu: None,
        }
    }

    /// Underlying session
    #[inline]
    #[must_use]
    pub fn session(&self) -> &Arc<ChapterSession> {
        &self.session
    }

    /// Current focus
    #[inline]
    #[must_use]
    pub fn focus(&self) -> Option<Focus> {
        self.focus
    }

    /// Open menu, if any
    #[inline]
    #[must_use]
    pub fn menu(&self) -> Option<MenuState> {
        self.menu
    }

    /// Types offered by the menu with their labels
    #[must_use]
    pub fn menu_choices() -> Vec<(BlockType, &'static str)> {
        BlockType::menu_choices()
            .into_iter()
            .map(|t| (t, t.label()))
            .collect()
    }

    /// Text typed into a block
    pub async fn input(&mut self, block_id: BlockId, content: impl Into<String>) -> EditorEffect {
        let result = self
            .session
            .buffer()
            .await
            .change_content(block_id, content);
        self.settle(result.map(|()| EditorEffect::Default))
    }

    /// Handle a key pressed in `block_id`
    pub async fn handle_key(&mut self, block_id: BlockId, event: KeyEvent) -> EditorEffect {
        let block = self.session.buffer().await.block(block_id).cloned();
        let Some(block) = block else {
            return self.settle(Err(EditorError::UnknownBlock(block_id)));
        };
        self.focus = Some(Focus {
            block_id,
            caret: Caret::At(event.cursor.offset),
        });

        let result = match event.key {
            Key::Char('/') if block.is_empty() && block.block_type.is_text() => {
                Ok(self.open_menu(MenuState {
                    anchor: Some(block_id),
                    replace: true,
                }))
            }
            Key::Escape if self.menu.is_some() => {
                self.menu = None;
                Ok(EditorEffect::CloseMenu)
            }
            Key::Enter if event.shift && block.block_type.is_text() => {
                self.line_break(&block, event.cursor).await
            }
            Key::Enter if !event.shift => self.enter(&block, event.cursor).await,
            Key::Backspace | Key::Delete if block.is_empty() => self.remove_empty(&block).await,
            Key::Backspace if event.cursor.is_at_start() => {
                self.merge_with_previous(block_id).await
            }
            Key::ArrowDown
                if event.cursor.is_at_end(&block.content) || block.is_single_line() =>
            {
                Ok(self
                    .session
                    .buffer()
                    .await
                    .next(block_id)
                    .map_or(EditorEffect::Default, |next| {
                        EditorEffect::focus(next.id, Caret::Start)
                    }))
            }
            Key::ArrowUp if event.cursor.is_at_start() || block.is_single_line() => Ok(self
                .session
                .buffer()
                .await
                .previous(block_id)
                .map_or(EditorEffect::Default, |prev| {
                    EditorEffect::focus(prev.id, Caret::End)
                })),
            _ => Ok(EditorEffect::Default),
        };
        self.settle(result)
    }

    /// Open the insert menu below `after` (or at the chapter start)
    pub fn open_insert_menu(&mut self, after: Option<BlockId>) -> EditorEffect {
        self.open_menu(MenuState {
            anchor: after,
            replace: false,
        })
    }

    /// Close the menu without choosing
    pub fn close_menu(&mut self) -> EditorEffect {
        self.menu = None;
        EditorEffect::CloseMenu
    }

    /// Apply the menu choice: convert the anchor or insert a new block
    pub async fn choose_menu_type(&mut self, block_type: BlockType) -> EditorEffect {
        let Some(menu) = self.menu.take() else {
            return EditorEffect::Default;
        };
        let result = match (menu.anchor, menu.replace) {
            (Some(anchor), true) => self
                .session
                .buffer()
                .await
                .change_type(anchor, block_type)
                .map(|()| EditorEffect::focus(anchor, Caret::Start)),
            (after, _) => self
                .session
                .buffer()
                .await
                .insert_block(after, block_type)
                .await
                .map(|id| EditorEffect::focus(id, Caret::Start)),
        };
        self.settle(result)
    }

    /// Copy a block (type and content) directly below itself.
    ///
    /// A figure block's copy starts unlinked, showing the placeholder.
    pub async fn duplicate(&mut self, block_id: BlockId) -> EditorEffect {
        let result = async {
            let mut buffer = self.session.buffer().await;
            let source = buffer
                .block(block_id)
                .cloned()
                .ok_or(EditorError::UnknownBlock(block_id))?;
            let id = buffer
                .insert_block_with_content(Some(block_id), source.block_type, source.content)
                .await?;
            Ok::<_, EditorError>(EditorEffect::focus(id, Caret::End))
        }
        .await;
        self.settle(result)
    }

    /// Drop `dragged` onto `target`.
    ///
    /// Dragging down lands after the target; dragging up lands before it.
    pub async fn drop_block(&mut self, dragged: BlockId, target: BlockId) -> EditorEffect {
        if dragged == target {
            return EditorEffect::Default;
        }
        let result = async {
            let mut buffer = self.session.buffer().await;
            let from = buffer
                .index_of(dragged)
                .ok_or(EditorError::UnknownBlock(dragged))?;
            let to = buffer
                .index_of(target)
                .ok_or(EditorError::UnknownBlock(target))?;
            let new_after = if from < to {
                Some(target)
            } else {
                buffer.previous(target).map(|b| b.id)
            };
            buffer.move_block(dragged, new_after)?;
            Ok::<_, EditorError>(EditorEffect::focus(dragged, Caret::End))
        }
        .await;
        self.settle(result)
    }

    /// Join a block onto the end of the previous text block
    pub async fn merge_with_previous(&mut self, block_id: BlockId) -> Result<EditorEffect, EditorError> {
        let mut buffer = self.session.buffer().await;
        let current = buffer
            .block(block_id)
            .cloned()
            .ok_or(EditorError::UnknownBlock(block_id))?;
        let Some(previous) = buffer.previous(block_id).cloned() else {
            return Ok(EditorEffect::Default);
        };
        if !current.block_type.is_text() || !previous.block_type.is_text() {
            return Ok(EditorEffect::Default);
        }

        let join = previous.char_len();
        buffer.change_content(previous.id, format!("{}{}", previous.content, current.content))?;
        buffer.delete_block(block_id)?;
        Ok(EditorEffect::focus(previous.id, Caret::At(join)))
    }

    /// Delete a block from the toolbar; focus moves to a neighbour
    pub async fn delete(&mut self, block_id: BlockId) -> EditorEffect {
        let result = async {
            let mut buffer = self.session.buffer().await;
            let neighbour = buffer
                .previous(block_id)
                .map(|b| (b.id, Caret::End))
                .or_else(|| buffer.next(block_id).map(|b| (b.id, Caret::Start)));
            buffer.delete_block(block_id)?;
            Ok::<_, EditorError>(neighbour.map_or(EditorEffect::Default, |(id, caret)| {
                EditorEffect::focus(id, caret)
            }))
        }
        .await;
        self.settle(result)
    }

    /// Insert a figure block after `after` and link `figure_id` to it.
    ///
    /// When the link is refused or fails, the new block is removed again.
    pub async fn insert_figure_block(
        &mut self,
        figures: &FigureService,
        after: Option<BlockId>,
        figure_id: FigureId,
    ) -> EditorEffect {
        let result = async {
            let id = self
                .session
                .buffer()
                .await
                .insert_block(after, BlockType::Figure)
                .await?;
            if let Err(err) = figures.link(id, figure_id).await {
                if let Err(cleanup) = self.session.buffer().await.retract(id).await {
                    tracing::warn!(block = %id, error = %cleanup, "unlinked figure block left in place");
                }
                return Err(err);
            }
            self.session
                .buffer()
                .await
                .set_figure_link(id, Some(figure_id))?;
            Ok::<_, EditorError>(EditorEffect::focus(id, Caret::Start))
        }
        .await;
        self.settle(result)
    }

    /// Show `figure_id` in a figure block.
    ///
    /// With `relink`, a figure shown by another block moves here; otherwise
    /// that is refused when figures are one-per-block.
    pub async fn link_figure(
        &mut self,
        figures: &FigureService,
        block_id: BlockId,
        figure_id: FigureId,
        relink: bool,
    ) -> EditorEffect {
        let result = async {
            let outcome = if relink {
                figures.relink(block_id, figure_id).await?
            } else {
                figures.link(block_id, figure_id).await?
            };
            let mut buffer = self.session.buffer().await;
            buffer.set_figure_link(block_id, Some(figure_id))?;
            if let Some(detached) = outcome.detached {
                if buffer.block(detached).is_some() {
                    buffer.set_figure_link(detached, None)?;
                }
            }
            Ok::<_, EditorError>(EditorEffect::focus(block_id, Caret::Start))
        }
        .await;
        self.settle(result)
    }

    /// Save through the session; failures stay in the banner
    pub async fn save(&self) -> Option<SaveOutcome> {
        self.session.save().await.ok()
    }

    /// Blocks in document order
    pub async fn blocks(&self) -> Vec<Block> {
        self.session.blocks().await
    }

    fn open_menu(&mut self, menu: MenuState) -> EditorEffect {
        self.menu = Some(menu);
        EditorEffect::OpenMenu(menu)
    }

    async fn enter(&mut self, block: &Block, cursor: TextCursor) -> Result<EditorEffect, EditorError> {
        let mut buffer = self.session.buffer().await;
        if !block.block_type.is_text() || cursor.is_at_end(&block.content) {
            let id = buffer
                .insert_block(Some(block.id), BlockType::Paragraph)
                .await?;
            return Ok(EditorEffect::focus(id, Caret::Start));
        }

        let (head, tail) = cursor.split(&block.content);
        let id = buffer
            .insert_block_with_content(Some(block.id), BlockType::Paragraph, tail)
            .await?;
        buffer.change_content(block.id, head)?;
        Ok(EditorEffect::focus(id, Caret::Start))
    }

    async fn line_break(&mut self, block: &Block, cursor: TextCursor) -> Result<EditorEffect, EditorError> {
        let content = cursor.insert(&block.content, "\n");
        self.session
            .buffer()
            .await
            .change_content(block.id, content)?;
        Ok(EditorEffect::LineBreak {
            cursor: TextCursor::at(cursor.offset + 1),
        })
    }

    async fn remove_empty(&mut self, block: &Block) -> Result<EditorEffect, EditorError> {
        let mut buffer = self.session.buffer().await;
        let Some(previous) = buffer.previous(block.id).map(|b| b.id) else {
            return Ok(EditorEffect::Default);
        };
        buffer.delete_block(block.id)?;
        Ok(EditorEffect::focus(previous, Caret::End))
    }

    fn settle(&mut self, result: Result<EditorEffect, EditorError>) -> EditorEffect {
        match self.session.track(result) {
            Some(effect) => {
                if let EditorEffect::Focus(focus) = effect {
                    self.focus = Some(focus);
                }
                effect
            }
            None => EditorEffect::Unchanged,
        }
    }
}
