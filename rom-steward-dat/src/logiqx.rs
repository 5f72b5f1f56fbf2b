//! Logiqx XML DAT parser.
//!
//! Streams events with quick-xml so memory stays bounded regardless of
//! input size. Root is `datafile`, with a `header` block and zero or more
//! `game`/`machine` elements each holding `rom`/`disk` rows. Unknown
//! elements and attributes are ignored.

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use rom_steward_core::EntryStatus;

use crate::error::DatError;
use crate::model::{normalize_hash, DatFile, DatGame, DatRom, ProgressFn, PROGRESS_CHUNK};

pub fn parse_logiqx<R: BufRead>(
    reader: R,
    progress: Option<&ProgressFn<'_>>,
) -> Result<DatFile, DatError> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut dat = DatFile::default();

    let mut in_header = false;
    let mut current_tag = String::new();
    let mut current_game: Option<DatGame> = None;

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let tag_name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match tag_name.as_str() {
                    "header" => in_header = true,
                    "game" | "machine" => current_game = Some(parse_game_attributes(e)?),
                    "rom" | "disk" => {
                        // Some writers emit <rom ...></rom> instead of <rom .../>
                        if let Some(ref mut game) = current_game {
                            game.roms.push(parse_rom_attributes(e)?);
                        }
                    }
                    _ => current_tag = tag_name,
                }
            }
            Event::Empty(ref e) => {
                let tag_name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag_name == "rom" || tag_name == "disk" {
                    if let Some(ref mut game) = current_game {
                        game.roms.push(parse_rom_attributes(e)?);
                    }
                }
            }
            Event::Text(ref e) => {
                let text = e.unescape()?.to_string();
                if in_header {
                    match current_tag.as_str() {
                        "name" => dat.header.name = text,
                        "description" => dat.header.description = text,
                        "version" => dat.header.version = text,
                        "author" => dat.header.author = text,
                        "url" => dat.header.url = text,
                        "date" => dat.header.date = text,
                        _ => {}
                    }
                } else if let Some(ref mut game) = current_game {
                    match current_tag.as_str() {
                        "description" => game.description = text,
                        "year" => game.year = some_nonempty(text),
                        "manufacturer" | "publisher" => game.publisher = some_nonempty(text),
                        "category" => game.category = some_nonempty(text),
                        "region" => game.region = some_nonempty(text),
                        "languages" => game.languages = some_nonempty(text),
                        _ => {}
                    }
                }
            }
            Event::End(ref e) => {
                let tag_name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match tag_name.as_str() {
                    "header" => in_header = false,
                    "game" | "machine" => {
                        if let Some(game) = current_game.take() {
                            dat.games.push(game);
                            if dat.games.len().is_multiple_of(PROGRESS_CHUNK) {
                                if let Some(p) = progress {
                                    p(dat.games.len());
                                }
                            }
                        }
                    }
                    _ => current_tag.clear(),
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if dat.header.name.is_empty() && dat.games.is_empty() {
        return Err(DatError::invalid_dat(
            "No header or games found in XML DAT file",
        ));
    }

    if let Some(p) = progress {
        p(dat.games.len());
    }

    Ok(dat)
}

fn some_nonempty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn parse_game_attributes(e: &BytesStart<'_>) -> Result<DatGame, DatError> {
    let mut game = DatGame::default();

    for attr in e.attributes() {
        let attr = attr?;
        let value = String::from_utf8_lossy(&attr.value).to_string();
        match attr.key.as_ref() {
            b"name" => game.name = value,
            b"cloneof" => game.clone_of = some_nonempty(value),
            b"romof" => game.rom_of = some_nonempty(value),
            b"sampleof" => game.sample_of = some_nonempty(value),
            b"isbios" => game.is_bios = value == "yes",
            b"isdevice" => game.is_device = value == "yes",
            b"ismechanical" => game.is_mechanical = value == "yes",
            _ => {}
        }
    }

    Ok(game)
}

fn parse_rom_attributes(e: &BytesStart<'_>) -> Result<DatRom, DatError> {
    let mut rom = DatRom::default();

    for attr in e.attributes() {
        let attr = attr?;
        let value = String::from_utf8_lossy(&attr.value).to_string();
        match attr.key.as_ref() {
            b"name" => rom.name = value,
            b"size" => {
                rom.size = value
                    .parse()
                    .map_err(|_| DatError::invalid_dat(format!("Invalid ROM size: {value}")))?;
            }
            b"crc" => rom.crc = normalize_hash(&value),
            b"md5" => rom.md5 = normalize_hash(&value),
            b"sha1" => rom.sha1 = normalize_hash(&value),
            b"status" => rom.status = EntryStatus::parse_str(&value),
            b"serial" => rom.serial = some_nonempty(value),
            b"merge" => rom.merge = some_nonempty(value),
            _ => {}
        }
    }

    Ok(rom)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_XML: &str = r#"<?xml version="1.0"?>
<!DOCTYPE datafile SYSTEM "http://www.logiqx.com/Dats/datafile.dtd">
<datafile>
    <header>
        <name>Nintendo - Super Nintendo Entertainment System</name>
        <description>Nintendo - Super Nintendo Entertainment System (20240101-000000)</description>
        <version>20240101-000000</version>
        <author>No-Intro</author>
    </header>
    <game name="Super Mario World (USA)">
        <description>Super Mario World (USA)</description>
        <rom name="Super Mario World (USA).sfc" size="524288" crc="B19ED489" sha1="6b47bb75d16514b6a476aa0c73a683a2a4c18765"/>
    </game>
    <game name="The Legend of Zelda - A Link to the Past (USA)">
        <description>The Legend of Zelda - A Link to the Past (USA)</description>
        <rom name="The Legend of Zelda - A Link to the Past (USA).sfc" size="1048576" crc="777aac2f" sha1="59b4b1730a3e2ae4b30efc9c1e0d31986b6c4b44"/>
    </game>
</datafile>"#;

    #[test]
    fn test_parse_basic_dat() {
        let dat = parse_logiqx(SAMPLE_XML.as_bytes(), None).unwrap();
        assert_eq!(
            dat.header.name,
            "Nintendo - Super Nintendo Entertainment System"
        );
        assert_eq!(dat.header.version, "20240101-000000");
        assert_eq!(dat.header.author, "No-Intro");
        assert_eq!(dat.games.len(), 2);

        let smw = &dat.games[0];
        assert_eq!(smw.name, "Super Mario World (USA)");
        assert_eq!(smw.roms[0].size, 524288);
        // Uppercase CRC is normalized at parse
        assert_eq!(smw.roms[0].crc.as_deref(), Some("b19ed489"));
    }

    #[test]
    fn test_machine_elements_and_clones() {
        let xml = r#"<?xml version="1.0"?>
<datafile>
    <header><name>Arcade</name><version>1</version></header>
    <machine name="puckman" isbios="no">
        <description>PuckMan (Japan)</description>
        <year>1980</year>
        <manufacturer>Namco</manufacturer>
        <rom name="pm1.bin" size="4096" crc="c1e6ab10" status="good"/>
        <rom name="pm2.bin" size="4096" crc="1a6fb2d4"/>
    </machine>
    <machine name="pacman" cloneof="puckman" romof="puckman">
        <description>Pac-Man (USA)</description>
        <rom name="pac1.bin" size="4096" crc="fee263b3" merge="pm1.bin"/>
    </machine>
</datafile>"#;
        let dat = parse_logiqx(xml.as_bytes(), None).unwrap();
        assert_eq!(dat.games.len(), 2);
        assert_eq!(dat.games[0].year.as_deref(), Some("1980"));
        assert_eq!(dat.games[0].publisher.as_deref(), Some("Namco"));
        assert_eq!(dat.games[1].clone_of.as_deref(), Some("puckman"));
        assert_eq!(dat.games[1].rom_of.as_deref(), Some("puckman"));
        assert_eq!(dat.games[1].roms[0].merge.as_deref(), Some("pm1.bin"));
    }

    #[test]
    fn test_empty_hashes_are_absent() {
        let xml = r#"<datafile>
    <header><name>T</name><version>1</version></header>
    <game name="G">
        <rom name="g.bin" size="16" crc="" md5="" sha1="da39a3ee5e6b4b0d3255bfef95601890afd80709"/>
    </game>
</datafile>"#;
        let dat = parse_logiqx(xml.as_bytes(), None).unwrap();
        let rom = &dat.games[0].roms[0];
        assert!(rom.crc.is_none());
        assert!(rom.md5.is_none());
        assert!(rom.sha1.is_some());
    }

    #[test]
    fn test_nodump_status() {
        let xml = r#"<datafile>
    <header><name>T</name><version>1</version></header>
    <game name="G">
        <rom name="a.bin" size="16" crc="deadbeef" status="baddump"/>
        <disk name="cd1" sha1="da39a3ee5e6b4b0d3255bfef95601890afd80709" status="nodump"/>
    </game>
</datafile>"#;
        let dat = parse_logiqx(xml.as_bytes(), None).unwrap();
        assert_eq!(dat.games[0].roms[0].status, EntryStatus::BadDump);
        assert_eq!(dat.games[0].roms[1].status, EntryStatus::NoDump);
        assert_eq!(dat.games[0].roms[1].size, 0);
    }

    #[test]
    fn test_unknown_elements_ignored() {
        let xml = r#"<datafile>
    <header><name>T</name><version>1</version><homepage>x</homepage></header>
    <game name="G" newattr="whatever">
        <release name="G" region="USA"/>
        <rom name="g.bin" size="16" crc="deadbeef" future="yes"/>
    </game>
</datafile>"#;
        let dat = parse_logiqx(xml.as_bytes(), None).unwrap();
        assert_eq!(dat.games.len(), 1);
        assert_eq!(dat.games[0].roms.len(), 1);
    }

    #[test]
    fn test_duplicate_rom_names_kept_in_order() {
        let xml = r#"<datafile>
    <header><name>T</name><version>1</version></header>
    <game name="G">
        <rom name="same.bin" size="1" crc="00000001"/>
        <rom name="same.bin" size="2" crc="00000002"/>
    </game>
</datafile>"#;
        let dat = parse_logiqx(xml.as_bytes(), None).unwrap();
        assert_eq!(dat.games[0].roms.len(), 2);
        assert_eq!(dat.games[0].roms[0].size, 1);
        assert_eq!(dat.games[0].roms[1].size, 2);
    }

    #[test]
    fn test_empty_dat_is_error() {
        let xml = r#"<?xml version="1.0"?><datafile></datafile>"#;
        assert!(parse_logiqx(xml.as_bytes(), None).is_err());
    }

    #[test]
    fn test_progress_callback_fires() {
        use std::cell::Cell;
        let mut xml = String::from("<datafile><header><name>T</name></header>");
        for i in 0..1200 {
            xml.push_str(&format!(
                r#"<game name="G{i}"><rom name="g{i}.bin" size="1" crc="0000{i:04x}"/></game>"#
            ));
        }
        xml.push_str("</datafile>");

        let last = Cell::new(0usize);
        let dat = parse_logiqx(xml.as_bytes(), Some(&|n| last.set(n))).unwrap();
        assert_eq!(dat.games.len(), 1200);
        assert_eq!(last.get(), 1200);
    }
}
