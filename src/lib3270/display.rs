//! TN3270 Display Buffer Management
//!
//! The display buffer is a flat, logically circular grid of cells. Field
//! structure is not stored separately: a field is simply the run of cells
//! following a cell that carries a field attribute, so every query about
//! fields is answered by scanning the grid.

use super::addressing::{coords_to_position, position_to_coords};
use super::ebcdic::Charset;
use super::field::{ExtendedAttributes, Field, FieldAttribute};

use serde::{Deserialize, Serialize};

/// Standard 3270 screen sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreenSize {
    /// Model 2: 24 rows x 80 columns (1920 characters)
    Model2,
    /// Model 3: 32 rows x 80 columns (2560 characters)
    Model3,
    /// Model 4: 43 rows x 80 columns (3440 characters)
    Model4,
    /// Model 5: 27 rows x 132 columns (3564 characters)
    Model5,
}

impl ScreenSize {
    /// Map a 3278 model number to its screen size
    pub fn from_model(model: u8) -> Option<Self> {
        match model {
            2 => Some(Self::Model2),
            3 => Some(Self::Model3),
            4 => Some(Self::Model4),
            5 => Some(Self::Model5),
            _ => None,
        }
    }

    pub fn model_number(&self) -> u8 {
        match self {
            Self::Model2 => 2,
            Self::Model3 => 3,
            Self::Model4 => 4,
            Self::Model5 => 5,
        }
    }

    /// Get the number of rows for this screen size
    pub fn rows(&self) -> usize {
        match self {
            Self::Model2 => 24,
            Self::Model3 => 32,
            Self::Model4 => 43,
            Self::Model5 => 27,
        }
    }

    /// Get the number of columns for this screen size
    pub fn cols(&self) -> usize {
        match self {
            Self::Model2 | Self::Model3 | Self::Model4 => 80,
            Self::Model5 => 132,
        }
    }

    /// Get the total buffer size (rows * cols)
    pub fn buffer_size(&self) -> usize {
        self.rows() * self.cols()
    }
}

/// One position of the display buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// Display character, '\0' for a cell nothing has painted
    pub ch: char,
    /// Present only on the cell that starts a field
    pub field_attr: Option<FieldAttribute>,
    /// Character attributes; on a field start, the field's extended attributes
    pub attrs: ExtendedAttributes,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: '\0',
            field_attr: None,
            attrs: ExtendedAttributes::default(),
        }
    }
}

impl Cell {
    pub fn is_field_start(&self) -> bool {
        self.field_attr.is_some()
    }

    pub fn charset(&self) -> Charset {
        self.attrs.charset
    }
}

/// 3270 Display Buffer
///
/// Holds both geometries a 3278 supports. Erase/Write selects the primary
/// (24x80) size, Erase/Write Alternate selects the model's alternate size.
#[derive(Debug, Clone)]
pub struct Display3270 {
    primary: ScreenSize,
    alternate: ScreenSize,
    use_alternate: bool,

    buffer: Vec<Cell>,

    /// Current cursor position (buffer offset)
    cursor: usize,

    keyboard_locked: bool,
    alarm: bool,
}

impl Display3270 {
    /// Create a display for the given model, starting at its alternate size
    pub fn new(alternate: ScreenSize) -> Self {
        Self {
            primary: ScreenSize::Model2,
            alternate,
            use_alternate: true,
            buffer: vec![Cell::default(); alternate.buffer_size()],
            cursor: 0,
            keyboard_locked: true,
            alarm: false,
        }
    }

    /// The geometry currently in use
    pub fn screen_size(&self) -> ScreenSize {
        if self.use_alternate {
            self.alternate
        } else {
            self.primary
        }
    }

    pub fn primary_size(&self) -> ScreenSize {
        self.primary
    }

    pub fn alternate_size(&self) -> ScreenSize {
        self.alternate
    }

    pub fn uses_alternate_size(&self) -> bool {
        self.use_alternate
    }

    pub fn rows(&self) -> usize {
        self.screen_size().rows()
    }

    pub fn cols(&self) -> usize {
        self.screen_size().cols()
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer and switch geometry, as Erase/Write does
    pub fn erase(&mut self, use_alternate: bool) {
        self.use_alternate = use_alternate;
        let size = self.screen_size().buffer_size();
        self.buffer.clear();
        self.buffer.resize(size, Cell::default());
        self.cursor = 0;
    }

    /// Clear every cell without changing geometry
    pub fn clear(&mut self) {
        self.buffer.fill(Cell::default());
        self.cursor = 0;
    }

    pub fn cell(&self, pos: usize) -> &Cell {
        &self.buffer[pos % self.buffer.len()]
    }

    pub fn cell_mut(&mut self, pos: usize) -> &mut Cell {
        let len = self.buffer.len();
        &mut self.buffer[pos % len]
    }

    pub fn cells(&self) -> &[Cell] {
        &self.buffer
    }

    /// Wrap a position into the buffer
    pub fn wrap(&self, pos: usize) -> usize {
        pos % self.buffer.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, pos: usize) {
        self.cursor = self.wrap(pos);
    }

    /// Cursor as (row, col)
    pub fn cursor_position(&self) -> (usize, usize) {
        position_to_coords(self.cursor, self.cols())
    }

    /// Move the cursor to (row, col); false if outside the screen
    pub fn set_cursor_coords(&mut self, row: usize, col: usize) -> bool {
        if row >= self.rows() || col >= self.cols() {
            return false;
        }
        self.cursor = coords_to_position(row, col, self.cols());
        true
    }

    /// Write a character cell, removing any field attribute there
    pub fn write_char(&mut self, pos: usize, ch: char, attrs: ExtendedAttributes) {
        let cell = self.cell_mut(pos);
        cell.ch = ch;
        cell.field_attr = None;
        cell.attrs = attrs;
    }

    /// Turn a cell into a field attribute cell
    pub fn set_field_attribute(&mut self, pos: usize, attr: FieldAttribute, extended: ExtendedAttributes) {
        let cell = self.cell_mut(pos);
        cell.ch = ' ';
        cell.field_attr = Some(attr);
        cell.attrs = extended;
    }

    pub fn is_field_start(&self, pos: usize) -> bool {
        self.cell(pos).is_field_start()
    }

    /// A screen with at least one field attribute is formatted
    pub fn is_formatted(&self) -> bool {
        self.buffer.iter().any(Cell::is_field_start)
    }

    /// Position of the attribute cell of the field containing `pos`
    pub fn field_start_for(&self, pos: usize) -> Option<usize> {
        let len = self.buffer.len();
        let pos = pos % len;
        (0..len)
            .map(|back| (pos + len - back) % len)
            .find(|&p| self.buffer[p].is_field_start())
    }

    /// Attribute of the field containing `pos`
    pub fn field_attribute_for(&self, pos: usize) -> Option<FieldAttribute> {
        self.field_start_for(pos)
            .and_then(|start| self.buffer[start].field_attr)
    }

    /// Protection of the field containing `pos`; unformatted screens are unprotected
    pub fn is_protected(&self, pos: usize) -> bool {
        self.field_attribute_for(pos)
            .map(|attr| attr.is_protected())
            .unwrap_or(false)
    }

    /// Whether the operator may type at `pos`
    pub fn is_writable(&self, pos: usize) -> bool {
        !self.is_field_start(pos) && !self.is_protected(pos)
    }

    /// Governing field attribute of every position, in one pass
    ///
    /// Field-start cells report their own attribute.
    pub fn governing_attributes(&self) -> Vec<Option<FieldAttribute>> {
        let mut current = self
            .buffer
            .iter()
            .rev()
            .find_map(|cell| cell.field_attr);
        self.buffer
            .iter()
            .map(|cell| {
                if cell.field_attr.is_some() {
                    current = cell.field_attr;
                }
                current
            })
            .collect()
    }

    /// All fields in buffer order
    pub fn fields(&self) -> Vec<Field> {
        let len = self.buffer.len();
        let starts: Vec<usize> = (0..len)
            .filter(|&p| self.buffer[p].is_field_start())
            .collect();
        starts
            .iter()
            .enumerate()
            .filter_map(|(i, &start)| {
                let next = starts[(i + 1) % starts.len()];
                let length = if next > start {
                    next - start - 1
                } else {
                    len - start + next - 1
                };
                self.buffer[start].field_attr.map(|attribute| Field {
                    start,
                    attribute,
                    extended: self.buffer[start].attrs,
                    length,
                })
            })
            .collect()
    }

    /// Set the MDT of the field containing `pos`
    pub fn set_modified(&mut self, pos: usize) {
        if let Some(start) = self.field_start_for(pos) {
            if let Some(attr) = self.buffer[start].field_attr.as_mut() {
                attr.set_modified(true);
            }
        }
    }

    /// Clear the MDT of every field
    pub fn reset_mdt(&mut self) {
        for cell in &mut self.buffer {
            if let Some(attr) = cell.field_attr.as_mut() {
                attr.set_modified(false);
            }
        }
    }

    /// First writable position strictly after `pos`, searching one full wrap
    pub fn next_unprotected_position(&self, pos: usize) -> Option<usize> {
        let len = self.buffer.len();
        let governing = self.governing_attributes();
        (1..=len)
            .map(|offset| (pos + offset) % len)
            .find(|&p| !self.buffer[p].is_field_start() && !governing[p].map(|a| a.is_protected()).unwrap_or(false))
    }

    /// Data start of the next unprotected field after `pos`
    pub fn next_field_data_start(&self, pos: usize) -> Option<usize> {
        let len = self.buffer.len();
        (1..=len)
            .map(|offset| (pos + offset) % len)
            .find(|&p| self.is_field_data_start(p))
    }

    /// Data start of the unprotected field at or before `pos`, not counting `pos` itself
    pub fn previous_field_data_start(&self, pos: usize) -> Option<usize> {
        let len = self.buffer.len();
        (1..=len)
            .map(|offset| (pos + len - offset) % len)
            .find(|&p| self.is_field_data_start(p))
    }

    fn is_field_data_start(&self, pos: usize) -> bool {
        let before = (pos + self.buffer.len() - 1) % self.buffer.len();
        match self.buffer[before].field_attr {
            Some(attr) => !attr.is_protected() && !self.is_field_start(pos),
            None => false,
        }
    }

    /// Erase every unprotected cell and reset MDTs of unprotected fields
    ///
    /// Returns the first writable position, if any.
    pub fn erase_all_unprotected(&mut self) -> Option<usize> {
        let governing = self.governing_attributes();
        for (cell, attr) in self.buffer.iter_mut().zip(governing.iter()) {
            match cell.field_attr.as_mut() {
                Some(field) => {
                    if !field.is_protected() {
                        field.set_modified(false);
                    }
                }
                None => {
                    if !attr.map(|a| a.is_protected()).unwrap_or(false) {
                        cell.ch = '\0';
                        cell.attrs = ExtendedAttributes::default();
                    }
                }
            }
        }
        if self.is_writable(0) {
            Some(0)
        } else {
            self.next_unprotected_position(0)
        }
    }

    pub fn lock_keyboard(&mut self) {
        self.keyboard_locked = true;
    }

    pub fn unlock_keyboard(&mut self) {
        self.keyboard_locked = false;
    }

    pub fn is_keyboard_locked(&self) -> bool {
        self.keyboard_locked
    }

    pub fn set_alarm(&mut self, alarm: bool) {
        self.alarm = alarm;
    }

    pub fn is_alarm(&self) -> bool {
        self.alarm
    }

    /// Text of one row as the operator would see it
    ///
    /// Attribute cells, unpainted cells and hidden fields show as blanks.
    pub fn get_row(&self, row: usize) -> Option<String> {
        if row >= self.rows() {
            return None;
        }
        let governing = self.governing_attributes();
        let start = row * self.cols();
        let text = (start..start + self.cols())
            .map(|pos| {
                let cell = &self.buffer[pos];
                let hidden = governing[pos].map(|a| a.is_hidden()).unwrap_or(false);
                if cell.is_field_start() || hidden || cell.ch == '\0' {
                    ' '
                } else {
                    cell.ch
                }
            })
            .collect();
        Some(text)
    }

    /// Text of the whole screen, one line per row
    pub fn screen_text(&self) -> String {
        (0..self.rows())
            .filter_map(|row| self.get_row(row))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl std::fmt::Display for Display3270 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.screen_text())
    }
}

impl Default for Display3270 {
    fn default() -> Self {
        Self::new(ScreenSize::Model2)
    }
}
