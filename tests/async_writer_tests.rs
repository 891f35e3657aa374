//! Tests for the async ZIP writer.
//!
//! Run with: cargo test --features async

#[cfg(feature = "async")]
mod async_tests {
    use fluxzip::async_writer::ZipWriter;
    use fluxzip::reader::ZipArchive;
    use fluxzip::writer::EntryOptions;
    use fluxzip::Result;
    use std::io::Cursor;
    use tempfile::NamedTempFile;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn writes_a_single_entry() -> Result<()> {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        {
            let file = tokio::fs::File::create(&path).await?;
            let mut writer = ZipWriter::new(file);
            writer.start_entry(EntryOptions::new("test.txt")).await?;
            writer.write_data(b"Hello, async!").await?;
            writer.finish().await?;
        }

        let bytes = std::fs::read(&path).unwrap();
        let archive = ZipArchive::open(&bytes)?;
        assert_eq!(archive.entries().len(), 1);
        assert_eq!(archive.entries()[0].name(), "test.txt");
        assert_eq!(archive.read(&archive.entries()[0])?, b"Hello, async!");

        Ok(())
    }

    #[tokio::test]
    async fn writes_multiple_entries_in_order() -> Result<()> {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        {
            let file = tokio::fs::File::create(&path).await?;
            let mut writer = ZipWriter::new(file);

            writer.start_entry(EntryOptions::new("file1.txt")).await?;
            writer.write_data(b"First file").await?;

            writer.start_entry(EntryOptions::new("file2.txt")).await?;
            writer.write_data(b"Second file").await?;

            writer.start_entry(EntryOptions::new("file3.txt")).await?;
            writer.write_data(b"Third file").await?;

            writer.finish().await?;
        }

        let bytes = std::fs::read(&path).unwrap();
        let archive = ZipArchive::open(&bytes)?;
        let names: Vec<&str> = archive.entries().iter().map(|e| e.name()).collect();
        assert_eq!(names, ["file1.txt", "file2.txt", "file3.txt"]);

        assert_eq!(archive.read(archive.by_name("file1.txt").unwrap())?, b"First file");
        assert_eq!(archive.read(archive.by_name("file2.txt").unwrap())?, b"Second file");
        assert_eq!(archive.read(archive.by_name("file3.txt").unwrap())?, b"Third file");

        Ok(())
    }

    #[tokio::test]
    async fn writes_large_data_across_many_chunks() -> Result<()> {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        // 2MB, written as many smaller chunks to exercise the streaming path.
        let large_data = vec![b'X'; 2 * 1024 * 1024];

        {
            let file = tokio::fs::File::create(&path).await?;
            let mut writer = ZipWriter::new(file);
            writer.start_entry(EntryOptions::new("large.bin")).await?;
            for chunk in large_data.chunks(8192) {
                writer.write_data(chunk).await?;
            }
            writer.finish().await?;
        }

        let bytes = std::fs::read(&path).unwrap();
        let archive = ZipArchive::open(&bytes)?;
        let entry = archive.by_name("large.bin").unwrap();
        assert_eq!(entry.size(), large_data.len() as u64);
        assert_eq!(archive.read(entry)?, large_data);

        Ok(())
    }

    #[tokio::test]
    async fn writes_to_an_in_memory_sink() -> Result<()> {
        let buffer = Cursor::new(Vec::new());
        let mut writer = ZipWriter::new(buffer);
        writer.start_entry(EntryOptions::new("memory.txt")).await?;
        writer.write_data(b"In-memory async ZIP").await?;

        let cursor = writer.finish().await?;
        let zip_bytes = cursor.into_inner();
        assert!(!zip_bytes.is_empty());

        let archive = ZipArchive::open(&zip_bytes)?;
        let data = archive.read(archive.by_name("memory.txt").unwrap())?;
        assert_eq!(data, b"In-memory async ZIP");

        Ok(())
    }

    #[tokio::test]
    async fn accumulates_several_writes_into_one_entry() -> Result<()> {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        {
            let file = tokio::fs::File::create(&path).await?;
            let mut writer = ZipWriter::new(file);
            writer.start_entry(EntryOptions::new("chunks.txt")).await?;
            writer.write_data(b"Chunk 1\n").await?;
            writer.write_data(b"Chunk 2\n").await?;
            writer.write_data(b"Chunk 3\n").await?;
            writer.finish().await?;
        }

        let bytes = std::fs::read(&path).unwrap();
        let archive = ZipArchive::open(&bytes)?;
        let data = archive.read(archive.by_name("chunks.txt").unwrap())?;
        assert_eq!(data, b"Chunk 1\nChunk 2\nChunk 3\n");

        Ok(())
    }

    #[tokio::test]
    async fn streams_from_a_source_file_without_buffering_it_whole() -> Result<()> {
        let source_file = NamedTempFile::new().unwrap();
        let source_data = b"This is source data that will be streamed";
        std::fs::write(source_file.path(), source_data).unwrap();

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        {
            let file = tokio::fs::File::create(&path).await?;
            let mut writer = ZipWriter::new(file);
            writer.start_entry(EntryOptions::new("streamed.txt")).await?;

            let mut source = tokio::fs::File::open(source_file.path()).await.unwrap();
            let mut buffer = vec![0u8; 8192];
            loop {
                let n = source.read(&mut buffer).await.unwrap();
                if n == 0 {
                    break;
                }
                writer.write_data(&buffer[..n]).await?;
            }

            writer.finish().await?;
        }

        let bytes = std::fs::read(&path).unwrap();
        let archive = ZipArchive::open(&bytes)?;
        let data = archive.read(archive.by_name("streamed.txt").unwrap())?;
        assert_eq!(data, source_data);

        Ok(())
    }

    #[tokio::test]
    async fn writes_an_empty_entry() -> Result<()> {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        {
            let file = tokio::fs::File::create(&path).await?;
            let mut writer = ZipWriter::new(file);
            writer.start_entry(EntryOptions::new("empty.txt")).await?;
            writer.finish().await?;
        }

        let bytes = std::fs::read(&path).unwrap();
        let archive = ZipArchive::open(&bytes)?;
        let entry = archive.by_name("empty.txt").unwrap();
        assert_eq!(entry.size(), 0);
        assert_eq!(archive.read(entry)?.len(), 0);

        Ok(())
    }

    #[tokio::test]
    async fn rejects_duplicate_names() -> Result<()> {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        let file = tokio::fs::File::create(&path).await?;
        let mut writer = ZipWriter::new(file);
        writer.start_entry(EntryOptions::new("a.txt")).await?;
        writer.write_data(b"one").await?;
        let err = writer.start_entry(EntryOptions::new("a.txt")).await;
        assert!(matches!(err, Err(fluxzip::FluxZipError::DuplicateName(_))));

        Ok(())
    }
}
