//! Sub-file call tests

use embedded_cardreader::{CardReader, Config, Error, Finished};

mod utils;

static MAIN: &[u8] = b"M98 SUB\nG1 X2\n";

fn macros() -> utils::RamMedia {
    let mut media = utils::RamMedia::new();
    media
        .file("/MAIN.GCO", MAIN)
        .file("/SUB.G", b"G1 X1\n")
        .file("/OTHER.G", b"G1 X3\n")
        .file("/MACROS/HOME.G", b"G28\n");
    media
}

fn read_line<const N: usize, const P: usize>(
    card: &mut CardReader<utils::RamMedia, utils::TestTimeSource, N, P>,
) -> String {
    let mut line = String::new();
    while let Some(byte) = card.next_byte().expect("read") {
        line.push(byte as char);
        if byte == b'\n' {
            break;
        }
    }
    line
}

#[test]
fn call_and_return() {
    let mut card = utils::make_reader(macros());
    card.open_and_print_file("MAIN.GCO").unwrap();
    assert_eq!(read_line(&mut card), "M98 SUB\n");
    assert_eq!(card.offset(), 8);

    card.push_call("SUB.G").unwrap();
    assert_eq!(card.call_depth(), 1);
    assert_eq!(card.abs_filename(), Some("/SUB.G"));
    assert_eq!(card.offset(), 0);
    assert!(card.is_printing());
    assert_eq!(read_line(&mut card), "G1 X1\n");
    assert!(card.eof());

    assert_eq!(card.file_has_finished(), Ok(Finished::Returned));
    assert_eq!(card.call_depth(), 0);
    assert_eq!(card.abs_filename(), Some("/MAIN.GCO"));
    assert_eq!(card.offset(), 8);
    assert!(card.is_printing());
    assert_eq!(read_line(&mut card), "G1 X2\n");

    assert_eq!(card.file_has_finished(), Ok(Finished::JobComplete));
    assert!(!card.is_file_open());
}

#[test]
fn print_while_printing_is_a_call() {
    let mut card = utils::make_reader(macros());
    card.open_and_print_file("MAIN.GCO").unwrap();
    read_line(&mut card);
    card.open_and_print_file("/MACROS/HOME.G").unwrap();
    assert_eq!(card.call_depth(), 1);
    assert_eq!(card.abs_filename(), Some("/MACROS/HOME.G"));

    card.pop_call().unwrap();
    assert_eq!(card.abs_filename(), Some("/MAIN.GCO"));
    assert_eq!(card.offset(), 8);
}

#[test]
fn too_deep() {
    let mut card = utils::make_reader(macros());
    card.open_and_print_file("MAIN.GCO").unwrap();
    read_line(&mut card);
    card.push_call("SUB.G").unwrap();
    card.next_byte().unwrap();

    assert_eq!(card.push_call("OTHER.G"), Err(Error::DepthExceeded));
    assert_eq!(card.call_depth(), 1);
    assert_eq!(card.abs_filename(), Some("/SUB.G"));
    assert_eq!(card.offset(), 1);
}

#[test]
fn failed_call_stays_put() {
    let mut card = utils::make_reader(macros());
    card.open_and_print_file("MAIN.GCO").unwrap();
    read_line(&mut card);

    assert_eq!(card.push_call("NOPE.G"), Err(Error::PathNotFound));
    assert_eq!(card.call_depth(), 0);
    assert_eq!(card.abs_filename(), Some("/MAIN.GCO"));
    assert_eq!(card.offset(), 8);
    assert!(card.is_printing());
}

#[test]
fn nothing_to_return_to() {
    let mut card = utils::make_reader(macros());
    assert_eq!(card.push_call("SUB.G"), Err(Error::NoFileOpen));
    card.open_file_read("MAIN.GCO").unwrap();
    assert_eq!(card.pop_call(), Err(Error::NoActiveCall));
}

#[test]
fn nested_calls() {
    let mut card: CardReader<utils::RamMedia, utils::TestTimeSource, 64, 2> =
        CardReader::new_with_config(macros(), utils::make_time_source(), Config::default());
    card.mount().unwrap();

    card.open_and_print_file("MAIN.GCO").unwrap();
    read_line(&mut card);
    card.push_call("SUB.G").unwrap();
    card.set_offset(3).unwrap();
    card.push_call("MACROS/HOME.G").unwrap();
    assert_eq!(card.call_depth(), 2);
    assert_eq!(card.push_call("OTHER.G"), Err(Error::DepthExceeded));

    assert_eq!(read_line(&mut card), "G28\n");
    assert_eq!(card.file_has_finished(), Ok(Finished::Returned));
    assert_eq!(card.abs_filename(), Some("/SUB.G"));
    assert_eq!(card.offset(), 3);
    assert_eq!(read_line(&mut card), "X1\n");
    assert_eq!(card.file_has_finished(), Ok(Finished::Returned));
    assert_eq!(card.abs_filename(), Some("/MAIN.GCO"));
    assert_eq!(card.offset(), 8);
}

#[test]
fn closing_drops_the_calls() {
    let mut card = utils::make_reader(macros());
    card.open_and_print_file("MAIN.GCO").unwrap();
    read_line(&mut card);
    card.push_call("SUB.G").unwrap();
    card.close_file().unwrap();
    assert_eq!(card.call_depth(), 0);
    assert_eq!(card.pop_call(), Err(Error::NoActiveCall));
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
